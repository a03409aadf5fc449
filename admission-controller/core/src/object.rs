use ahash::AHashMap as HashMap;
use garden_admission_controller_k8s_api::{
    Bastion, CredentialsBinding, NamespacedCloudProfile, ObjectMeta, Project, Resource,
    SecretBinding, Seed, Shoot,
};
use serde_json::Value;

type DecodeFn = fn(Value) -> serde_json::Result<Object>;

/// Implemented by every resource type an [`Object`] may hold.
pub trait Typed: Sized {
    const KIND: Kind;

    fn from_object(obj: &Object) -> Option<&Self>;

    fn from_object_mut(obj: &mut Object) -> Option<&mut Self>;

    fn into_object(self) -> Object;
}

/// Declares the closed set of resource kinds the engine handles.
///
/// Each entry yields a [`Kind`] variant, an [`Object`] variant holding the typed resource and
/// a [`Typed`] impl. Handling a new kind only requires adding an entry.
macro_rules! objects {
    ($($kind:ident => $ty:ty),+ $(,)?) => {
        #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Kind {
            $($kind),+
        }

        /// A typed object of one of the handled kinds.
        #[derive(Clone, Debug, PartialEq)]
        pub enum Object {
            $($kind($ty)),+
        }

        impl Kind {
            pub const ALL: &'static [Kind] = &[$(Kind::$kind),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(Kind::$kind => stringify!($kind)),+
                }
            }

            pub fn group(self) -> String {
                match self {
                    $(Kind::$kind => <$ty as Resource>::group(&()).into_owned()),+
                }
            }

            /// The plural resource name, e.g. `shoots`.
            pub fn resource(self) -> String {
                match self {
                    $(Kind::$kind => <$ty as Resource>::plural(&()).into_owned()),+
                }
            }

            fn decode_fn(self) -> DecodeFn {
                match self {
                    $(Kind::$kind => {
                        fn decode(value: Value) -> serde_json::Result<Object> {
                            serde_json::from_value::<$ty>(value).map(Object::$kind)
                        }
                        decode as DecodeFn
                    }),+
                }
            }
        }

        impl Object {
            pub fn kind(&self) -> Kind {
                match self {
                    $(Object::$kind(_) => Kind::$kind),+
                }
            }

            pub fn meta(&self) -> &ObjectMeta {
                match self {
                    $(Object::$kind(obj) => obj.meta()),+
                }
            }

            pub fn meta_mut(&mut self) -> &mut ObjectMeta {
                match self {
                    $(Object::$kind(obj) => obj.meta_mut()),+
                }
            }

            pub fn to_value(&self) -> serde_json::Result<Value> {
                match self {
                    $(Object::$kind(obj) => serde_json::to_value(obj)),+
                }
            }
        }

        $(
            impl Typed for $ty {
                const KIND: Kind = Kind::$kind;

                fn from_object(obj: &Object) -> Option<&Self> {
                    match obj {
                        Object::$kind(obj) => Some(obj),
                        _ => None,
                    }
                }

                fn from_object_mut(obj: &mut Object) -> Option<&mut Self> {
                    match obj {
                        Object::$kind(obj) => Some(obj),
                        _ => None,
                    }
                }

                fn into_object(self) -> Object {
                    Object::$kind(self)
                }
            }
        )+
    };
}

objects! {
    Bastion => Bastion,
    CredentialsBinding => CredentialsBinding,
    NamespacedCloudProfile => NamespacedCloudProfile,
    Project => Project,
    SecretBinding => SecretBinding,
    Seed => Seed,
    Shoot => Shoot,
}

/// Decodes request objects into typed [`Object`]s, keyed by API group and kind.
#[derive(Clone, Debug)]
pub struct Decoder {
    kinds: HashMap<(String, String), Kind>,
    decoders: HashMap<Kind, DecodeFn>,
}

// === impl Decoder ===

impl Decoder {
    pub fn new() -> Self {
        let kinds = Kind::ALL
            .iter()
            .map(|&kind| ((kind.group(), kind.as_str().to_string()), kind))
            .collect();
        let decoders = Kind::ALL
            .iter()
            .map(|&kind| (kind, kind.decode_fn()))
            .collect();
        Self { kinds, decoders }
    }

    /// Returns the handled kind for the given group and kind, if any.
    pub fn lookup(&self, group: &str, kind: &str) -> Option<Kind> {
        self.kinds
            .get(&(group.to_string(), kind.to_string()))
            .copied()
    }

    pub fn decode(&self, kind: Kind, value: Value) -> serde_json::Result<Object> {
        match self.decoders.get(&kind) {
            Some(decode) => decode(value),
            None => kind.decode_fn()(value),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
