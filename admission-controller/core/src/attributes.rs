use crate::{
    object::{Kind, Object, Typed},
    Error,
};
use std::{collections::BTreeMap, fmt};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Connect,
}

/// The identity of the requester.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct User {
    pub name: String,
    pub uid: String,
    pub groups: Vec<String>,
    pub extra: BTreeMap<String, Vec<String>>,
}

/// Everything an admission plugin may inspect about a request.
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes {
    pub kind: Kind,
    pub namespace: String,
    pub name: String,
    /// Empty for the main resource.
    pub subresource: String,
    pub operation: Operation,
    pub user: User,
    pub dry_run: bool,
    /// The incoming object. Absent on delete.
    pub object: Option<Object>,
    /// The persisted object. Present on update and delete.
    pub old_object: Option<Object>,
}

// === impl Operation ===

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
        })
    }
}

// === impl Attributes ===

impl Attributes {
    /// Builds the attributes of a request for `object`, taking kind, namespace and name from it.
    pub fn new(operation: Operation, object: impl Typed, user: User) -> Self {
        let object = object.into_object();
        let meta = object.meta();
        Self {
            kind: object.kind(),
            namespace: meta.namespace.clone().unwrap_or_default(),
            name: meta.name.clone().unwrap_or_default(),
            subresource: String::new(),
            operation,
            user,
            dry_run: false,
            object: Some(object),
            old_object: None,
        }
    }

    pub fn with_old_object(mut self, old: impl Typed) -> Self {
        self.old_object = Some(old.into_object());
        self
    }

    pub fn with_subresource(mut self, subresource: impl Into<String>) -> Self {
        self.subresource = subresource.into();
        self
    }

    /// Builds the attributes of a delete request for `old`.
    pub fn delete(old: impl Typed, user: User) -> Self {
        let mut attrs = Self::new(Operation::Delete, old, user);
        attrs.old_object = attrs.object.take();
        attrs
    }

    /// The incoming object as `T`.
    ///
    /// A missing object or an object of another kind is an internal error.
    pub fn object<T: Typed>(&self) -> Result<&T, Error> {
        let obj = self.object.as_ref().ok_or_else(|| self.missing("object"))?;
        T::from_object(obj).ok_or_else(|| self.mismatch::<T>(obj))
    }

    pub fn object_mut<T: Typed>(&mut self) -> Result<&mut T, Error> {
        let kind = self.kind;
        let obj = match self.object.as_mut() {
            Some(obj) => obj,
            None => {
                return Err(Error::internal(anyhow::anyhow!(
                    "{} request is missing the object",
                    kind.as_str()
                )))
            }
        };
        let actual = obj.kind();
        T::from_object_mut(obj).ok_or_else(|| {
            Error::internal(anyhow::anyhow!(
                "expected {}, got {}",
                T::KIND.as_str(),
                actual.as_str()
            ))
        })
    }

    /// The persisted object as `T`, if the request carries one.
    pub fn old_object<T: Typed>(&self) -> Result<Option<&T>, Error> {
        match self.old_object.as_ref() {
            None => Ok(None),
            Some(obj) => T::from_object(obj)
                .map(Some)
                .ok_or_else(|| self.mismatch::<T>(obj)),
        }
    }

    /// The persisted object as `T`; a request without one is an internal error.
    pub fn require_old_object<T: Typed>(&self) -> Result<&T, Error> {
        self.old_object::<T>()?
            .ok_or_else(|| self.missing("old object"))
    }

    fn missing(&self, what: &str) -> Error {
        Error::internal(anyhow::anyhow!(
            "{} {} request is missing the {what}",
            self.kind.as_str(),
            self.operation
        ))
    }

    fn mismatch<T: Typed>(&self, obj: &Object) -> Error {
        Error::internal(anyhow::anyhow!(
            "expected {}, got {}",
            T::KIND.as_str(),
            obj.kind().as_str()
        ))
    }
}
