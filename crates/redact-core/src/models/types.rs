//! Service, media type and region selectors. Each serializes to the
//! lowercase path or query value the service expects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $wire:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($wire => Ok($name::$variant),)+
                    other => Err(format!(
                        "unknown {} '{}', expected one of: {}",
                        stringify!($name),
                        other,
                        [$($wire),+].join(", ")
                    )),
                }
            }
        }
    };
}

wire_enum!(
    /// Kind of processing the service applies.
    ServiceType {
        Blur => "blur",
        Dnat => "dnat",
        Extract => "extract",
        RedactArea => "redact_area",
    }
);

wire_enum!(
    /// Kind of media submitted.
    InputType {
        Images => "images",
        Videos => "videos",
        Archives => "archives",
    }
);

wire_enum!(
    /// Container format requested for the result.
    OutputType {
        Images => "images",
        Videos => "videos",
        Archives => "archives",
        Overlays => "overlays",
        Labels => "labels",
    }
);

wire_enum!(
    /// Region whose license plate and privacy rules apply.
    Region {
        Germany => "germany",
        MainlandChina => "mainland_china",
        UnitedStatesOfAmerica => "united_states_of_america",
    }
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names() {
        assert_eq!(ServiceType::RedactArea.to_string(), "redact_area");
        assert_eq!(OutputType::Labels.as_str(), "labels");
        assert_eq!("Mainland_China".parse::<Region>().unwrap(), Region::MainlandChina);
        assert_eq!(
            serde_json::to_string(&Region::UnitedStatesOfAmerica).unwrap(),
            "\"united_states_of_america\""
        );
    }

    #[test]
    fn unknown_value_lists_choices() {
        let err = "gif".parse::<InputType>().unwrap_err();
        assert!(err.contains("images, videos, archives"), "{err}");
    }

    #[test]
    fn every_variant_parses_back() {
        for s in ServiceType::ALL {
            assert_eq!(s.as_str().parse::<ServiceType>().unwrap(), *s);
        }
        for o in OutputType::ALL {
            assert_eq!(o.as_str().parse::<OutputType>().unwrap(), *o);
        }
    }
}
