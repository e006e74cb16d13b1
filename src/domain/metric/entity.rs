use serde::Serialize;

/// What a series is about: an instance, or one disk attached to it.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EntityRef {
    pub instance_name: String,
    pub device_name: Option<String>,
}

impl EntityRef {
    pub fn instance(instance_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            device_name: None,
        }
    }

    pub fn disk(instance_name: impl Into<String>, device_name: impl Into<String>) -> Self {
        Self {
            instance_name: instance_name.into(),
            device_name: Some(device_name.into()),
        }
    }

    /// Output namespace below the instance directory, e.g. `["disk", "sdb"]`.
    pub fn tag_path(&self) -> Vec<String> {
        match &self.device_name {
            Some(device) => vec!["disk".to_string(), device.clone()],
            None => Vec::new(),
        }
    }
}
