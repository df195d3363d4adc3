use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

/// Fixed upper bound on the number of pending images in a session.
pub const MAX_IMAGES: usize = 10;

/// Opaque identifier of a pending image, unique within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageId(Uuid);

impl ImageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ImageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for ImageId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// A user-selected file: a blob with its declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
        }
    }
}

/// An accepted image awaiting submission, with a displayable preview.
///
/// Immutable once created; `preview_data` is a `data:<mime>;base64,...` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    id: ImageId,
    file: ImageFile,
    preview_data: String,
}

impl PendingImage {
    pub fn new(file: ImageFile, preview_data: impl Into<String>) -> Self {
        Self {
            id: ImageId::new(),
            file,
            preview_data: preview_data.into(),
        }
    }

    pub fn id(&self) -> ImageId {
        self.id
    }

    pub fn file(&self) -> &ImageFile {
        &self.file
    }

    pub fn mime_type(&self) -> &str {
        &self.file.mime_type
    }

    pub fn preview_data(&self) -> &str {
        &self.preview_data
    }
}

// Raw bytes stay in memory; observers only see the preview.
impl Serialize for PendingImage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("PendingImage", 5)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("name", &self.file.name)?;
        s.serialize_field("mime_type", &self.file.mime_type)?;
        s.serialize_field("size_bytes", &self.file.bytes.len())?;
        s.serialize_field("preview_data", &self.preview_data)?;
        s.end()
    }
}

/// Discrete phase of the presentation state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Idle => "idle",
            Phase::Loading => "loading",
            Phase::Success => "success",
            Phase::Error => "error",
        };
        f.write_str(s)
    }
}

/// Result of a successful estimate, rendered verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimationOutcome {
    pub result_text: String,
}

/// Category of a failed request, one per entry of the error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Configuration,
    Transport,
    Unknown,
}

/// A human-readable error shown in place of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorState {
    pub kind: ErrorKind,
    pub message: String,
}

/// Snapshot of the whole session, published to observers on every transition.
///
/// `result` and `error` are never both set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub images: Vec<PendingImage>,
    pub phase: Phase,
    pub result: Option<EstimationOutcome>,
    pub error: Option<ErrorState>,
}

impl SessionState {
    pub fn is_loading(&self) -> bool {
        self.phase == Phase::Loading
    }

    pub fn image_ids(&self) -> Vec<ImageId> {
        self.images.iter().map(PendingImage::id).collect()
    }
}
