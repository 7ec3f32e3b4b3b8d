//! Codec - Discriminated JSON unions (`@odata.type` and friends)
//!
//! Azure models describe polymorphic payloads with a string discriminator
//! field inside the JSON object. [`odata_union!`](crate::odata_union) turns a
//! list of `(variant, payload type, discriminator string)` into an enum with
//! hand-written `Serialize`/`Deserialize` impls:
//!
//! - encoding serializes the payload and injects the variant's discriminator;
//! - decoding reads the discriminator first and dispatches on it;
//! - unknown discriminators decode into `Unknown(RawVariant)` and re-encode
//!   unchanged;
//! - a missing or non-string discriminator is an error.

use serde_json::{Map, Value as Json};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("{union}: expected a JSON object")]
    NotAnObject { union: &'static str },

    #[error("{union}: missing discriminator field {field:?}")]
    MissingDiscriminator {
        union: &'static str,
        field: &'static str,
    },

    #[error("{union}: discriminator field {field:?} must be a string")]
    InvalidDiscriminator {
        union: &'static str,
        field: &'static str,
    },

    #[error("{union}: {source}")]
    Json {
        union: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A union member whose discriminator this build does not know about
#[derive(Debug, Clone, PartialEq)]
pub struct RawVariant {
    pub discriminator: String,
    /// Every field except the discriminator
    pub fields: Map<String, Json>,
}

impl RawVariant {
    pub fn to_json(&self, field: &str) -> Json {
        let mut obj = self.fields.clone();
        obj.insert(field.to_string(), Json::String(self.discriminator.clone()));
        Json::Object(obj)
    }
}

/// Serialize `payload` and inject `field = tag`
pub fn encode_tagged<T: serde::Serialize>(
    union: &'static str,
    field: &'static str,
    tag: &str,
    payload: &T,
) -> Result<Json, CodecError> {
    let value =
        serde_json::to_value(payload).map_err(|source| CodecError::Json { union, source })?;
    let Json::Object(mut obj) = value else {
        return Err(CodecError::NotAnObject { union });
    };
    obj.insert(field.to_string(), Json::String(tag.to_string()));
    Ok(Json::Object(obj))
}

/// Remove and return the discriminator from an encoded union member
pub fn take_discriminator(
    union: &'static str,
    field: &'static str,
    value: Json,
) -> Result<(String, Map<String, Json>), CodecError> {
    let Json::Object(mut obj) = value else {
        return Err(CodecError::NotAnObject { union });
    };
    match obj.remove(field) {
        Some(Json::String(tag)) => Ok((tag, obj)),
        Some(_) => Err(CodecError::InvalidDiscriminator { union, field }),
        None => Err(CodecError::MissingDiscriminator { union, field }),
    }
}

/// Decode the remaining fields into a known variant's payload
pub fn decode_payload<T: serde::de::DeserializeOwned>(
    union: &'static str,
    fields: Map<String, Json>,
) -> Result<T, CodecError> {
    serde_json::from_value(Json::Object(fields)).map_err(|source| CodecError::Json { union, source })
}

/// Declare a discriminated JSON union.
///
/// ```ignore
/// odata_union! {
///     /// A media transform preset
///     pub enum Preset = "@odata.type" {
///         AudioAnalyzer(AudioAnalyzerPreset) = "#Microsoft.Media.AudioAnalyzerPreset",
///         StandardEncoder(StandardEncoderPreset) = "#Microsoft.Media.StandardEncoderPreset",
///     }
/// }
/// ```
#[macro_export]
macro_rules! odata_union {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident = $field:literal {
            $( $(#[$vmeta:meta])* $variant:ident($payload:ty) = $tag:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        $vis enum $name {
            $( $(#[$vmeta])* $variant($payload), )+
            /// Discriminator not known to this build; preserved verbatim
            Unknown($crate::codec::RawVariant),
        }

        impl $name {
            pub const DISCRIMINATOR_FIELD: &'static str = $field;

            /// Discriminator string of this value
            pub fn discriminator(&self) -> &str {
                match self {
                    $( $name::$variant(_) => $tag, )+
                    $name::Unknown(raw) => &raw.discriminator,
                }
            }
        }

        impl $crate::__private::serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> ::std::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                use $crate::__private::serde::ser::Error as _;
                let value = match self {
                    $(
                        $name::$variant(payload) => $crate::codec::encode_tagged(
                            stringify!($name),
                            $field,
                            $tag,
                            payload,
                        )
                        .map_err(S::Error::custom)?,
                    )+
                    $name::Unknown(raw) => raw.to_json($field),
                };
                $crate::__private::serde::Serialize::serialize(&value, serializer)
            }
        }

        impl<'de> $crate::__private::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::std::result::Result<Self, D::Error>
            where
                D: $crate::__private::serde::Deserializer<'de>,
            {
                use $crate::__private::serde::de::Error as _;
                let value: $crate::__private::serde_json::Value =
                    $crate::__private::serde::Deserialize::deserialize(deserializer)?;
                let (tag, fields) =
                    $crate::codec::take_discriminator(stringify!($name), $field, value)
                        .map_err(D::Error::custom)?;
                match tag.as_str() {
                    $(
                        $tag => $crate::codec::decode_payload(stringify!($name), fields)
                            .map($name::$variant)
                            .map_err(D::Error::custom),
                    )+
                    _ => Ok($name::Unknown($crate::codec::RawVariant {
                        discriminator: tag,
                        fields,
                    })),
                }
            }
        }
    };
}
