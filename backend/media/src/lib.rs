pub mod data_url;
pub mod intake;
pub mod mime_detect;
pub mod preview;

pub use data_url::{data_url_payload, encode_data_url};
pub use intake::{decode_file, submit_files, IntakeError, SelectedFile};
pub use mime_detect::{detect_mime_type, is_image, sniff_mime_type};
pub use preview::{AppendReport, PreviewStore};
