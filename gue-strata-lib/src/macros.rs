// Generates protocol number newtypes: named constants, primitive conversions,
// kebab-case `Display`, and (with the `serde` feature) name-or-hex serde.
#[macro_export]
macro_rules! protocol_constants {
    // Constant constructors. Plain u8 fields are used as-is, byteorder
    // wrappers go through their const `new`.
    (@wrap identity, $ztype:ty, $val:literal) => { $val };
    (@wrap byteorder, $ztype:ty, $val:literal) => { <$ztype>::new($val) };

    (@define
        $(#[$outer:meta])*
        $type_name:ident, $ztype:ty, $primitive:ident, $wrap:ident,
        $( $const_name:ident = $val:literal; )+
    ) => {
        paste::paste! {
            $(#[$outer])*
            #[doc = concat!("Wire value stored as `", stringify!($ztype), "`.")]
            #[derive(
                Clone,
                Copy,
                PartialEq,
                Eq,
                Hash,
                Debug,
                FromBytes,
                IntoBytes,
                Immutable,
                KnownLayout,
            )]
            #[repr(transparent)]
            pub struct $type_name(pub $ztype);

            impl $type_name {
                $(
                    pub const $const_name: $type_name =
                        $type_name($crate::protocol_constants!(@wrap $wrap, $ztype, $val));
                )+

                /// Returns the raw protocol number
                #[inline]
                pub fn value(&self) -> $primitive {
                    self.0.into()
                }

                /// Returns the registered name, if this number has one
                pub fn name(&self) -> Option<&'static str> {
                    [< $type_name Name >]::try_from(self.value()).ok().map(Into::into)
                }

                /// Check whether the number is one of the named constants
                #[inline]
                pub fn is_valid(&self) -> bool {
                    self.name().is_some()
                }
            }

            #[derive(Debug, PartialEq, Eq, Clone, Copy, strum::EnumString, strum::IntoStaticStr)]
            #[strum(serialize_all = "kebab-case")]
            #[allow(non_camel_case_types)]
            enum [< $type_name Name >] {
                $( $const_name, )+
            }

            impl From<[< $type_name Name >]> for $primitive {
                fn from(v: [< $type_name Name >]) -> Self {
                    match v {
                        $( [< $type_name Name >]::$const_name => $val, )+
                    }
                }
            }

            impl TryFrom<$primitive> for [< $type_name Name >] {
                type Error = ();

                fn try_from(v: $primitive) -> Result<Self, Self::Error> {
                    match v {
                        $( $val => Ok([< $type_name Name >]::$const_name), )+
                        _ => Err(()),
                    }
                }
            }

            impl From<$primitive> for $type_name {
                #[inline]
                fn from(v: $primitive) -> Self {
                    Self(v.into())
                }
            }

            impl From<$type_name> for $primitive {
                #[inline]
                fn from(v: $type_name) -> Self {
                    v.0.into()
                }
            }

            impl std::str::FromStr for $type_name {
                type Err = String;

                /// Accepts a kebab-case name (`ip-encap`), a `0x` hex value or a decimal value
                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    if let Ok(name) = <[< $type_name Name >] as std::str::FromStr>::from_str(s) {
                        let p: $primitive = name.into();
                        return Ok(p.into());
                    }
                    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
                        Some(hex) => $primitive::from_str_radix(hex, 16),
                        None => s.parse::<$primitive>(),
                    };
                    parsed
                        .map(Into::into)
                        .map_err(|_| format!("unknown {}: {}", stringify!($type_name), s))
                }
            }

            impl std::fmt::Display for $type_name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    match self.name() {
                        Some(name) => f.write_str(name),
                        None => write!(f, "0x{:x}", self.value()),
                    }
                }
            }

            #[cfg(feature = "serde")]
            impl serde::Serialize for $type_name {
                fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
                where
                    S: serde::Serializer,
                {
                    serializer.collect_str(self)
                }
            }

            #[cfg(feature = "serde")]
            impl<'de> serde::Deserialize<'de> for $type_name {
                fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
                where
                    D: serde::Deserializer<'de>,
                {
                    struct Visitor;

                    impl<'de> serde::de::Visitor<'de> for Visitor {
                        type Value = $type_name;

                        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                            f.write_str("a protocol name, hex string or integer")
                        }

                        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                        where
                            E: serde::de::Error,
                        {
                            value.parse().map_err(E::custom)
                        }

                        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
                        where
                            E: serde::de::Error,
                        {
                            $primitive::try_from(value)
                                .map(Into::into)
                                .map_err(|_| E::custom(format!("{} out of range", value)))
                        }
                    }

                    deserializer.deserialize_any(Visitor)
                }
            }
        }
    };

    // Entry point: single byte protocol numbers
    (
        $(#[$outer:meta])*
        $type_name:ident, u8:
        $( $const_name:ident = $val:literal; )+
    ) => {
        $crate::protocol_constants!(@define $(#[$outer])* $type_name, u8, u8, identity, $( $const_name = $val; )+);
    };

    // Entry point: multi-byte protocol numbers stored as zerocopy byteorder types
    (
        $(#[$outer:meta])*
        $type_name:ident, $ztype:ty, $primitive:ident:
        $( $const_name:ident = $val:literal; )+
    ) => {
        $crate::protocol_constants!(@define $(#[$outer])* $type_name, $ztype, $primitive, byteorder, $( $const_name = $val; )+);
    };
}
