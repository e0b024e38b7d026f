use std::fmt;

use serde::{Deserialize, Serialize};

pub const PDF_MEDIA_TYPE: &str = "application/pdf";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

id_newtype!(UserId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInMethod {
    Password,
    Google,
}

impl SignInMethod {
    pub fn provider_id(self) -> &'static str {
        match self {
            SignInMethod::Password => "password",
            SignInMethod::Google => "google.com",
        }
    }
}

/// Identity as reported by the identity provider. The client only ever holds
/// a cached copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub uid: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub method: SignInMethod,
}

impl Identity {
    pub fn new(uid: impl Into<String>, method: SignInMethod) -> Self {
        Self {
            uid: UserId(uid.into()),
            email: None,
            display_name: None,
            photo_url: None,
            method,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Best human-readable label: display name, then email, then uid.
    pub fn label(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.email.as_deref())
            .unwrap_or(&self.uid.0)
    }
}
