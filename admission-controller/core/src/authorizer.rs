use crate::{attributes::User, Error};
use std::{fmt, sync::Arc};

/// A request to the authorization oracle: may `user` perform `verb` on the resource?
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizationAttributes {
    pub user: User,
    pub verb: String,
    pub group: String,
    pub resource: String,
    pub subresource: String,
    pub namespace: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(String),
}

/// An external authorization oracle.
///
/// Calls block the request until a decision or an error is returned; the oracle is never
/// retried and its errors are never treated as an allow.
#[async_trait::async_trait]
pub trait Authorize: Send + Sync {
    async fn authorize(&self, attrs: &AuthorizationAttributes) -> anyhow::Result<Decision>;
}

pub type SharedAuthorizer = Arc<dyn Authorize>;

// === impl AuthorizationAttributes ===

impl AuthorizationAttributes {
    pub fn new(user: &User, verb: impl Into<String>) -> Self {
        Self {
            user: user.clone(),
            verb: verb.into(),
            ..Default::default()
        }
    }

    pub fn resource(mut self, group: impl Into<String>, resource: impl Into<String>) -> Self {
        self.group = group.into();
        self.resource = resource.into();
        self
    }

    pub fn object(mut self, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self.name = name.into();
        self
    }
}

impl fmt::Display for AuthorizationAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resource = if self.group.is_empty() {
            self.resource.clone()
        } else {
            format!("{}.{}", self.resource, self.group)
        };
        write!(f, "user {:?} cannot {} {}", self.user.name, self.verb, resource)?;
        if !self.name.is_empty() {
            write!(f, " {:?}", self.name)?;
        }
        if !self.namespace.is_empty() {
            write!(f, " in namespace {:?}", self.namespace)?;
        }
        Ok(())
    }
}

/// Asks the oracle and maps a denial to [`Error::Forbidden`] and an oracle failure to
/// [`Error::Internal`].
pub async fn require(
    authorizer: &dyn Authorize,
    attrs: &AuthorizationAttributes,
) -> Result<(), Error> {
    match authorizer.authorize(attrs).await {
        Ok(Decision::Allow) => Ok(()),
        Ok(Decision::Deny(reason)) => {
            tracing::debug!(%attrs, %reason, "Authorization denied");
            if reason.is_empty() {
                Err(Error::forbidden(attrs))
            } else {
                Err(Error::forbidden(format_args!("{attrs}: {reason}")))
            }
        }
        Err(error) => Err(Error::internal(
            error.context(format!("failed to authorize {} {}", attrs.verb, attrs.resource)),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(anyhow::Result<Decision>);

    #[async_trait::async_trait]
    impl Authorize for Fixed {
        async fn authorize(&self, _: &AuthorizationAttributes) -> anyhow::Result<Decision> {
            match &self.0 {
                Ok(decision) => Ok(decision.clone()),
                Err(error) => Err(anyhow::anyhow!("{error}")),
            }
        }
    }

    fn attrs() -> AuthorizationAttributes {
        let user = User {
            name: "alice".into(),
            ..Default::default()
        };
        AuthorizationAttributes::new(&user, "get")
            .resource("", "secrets")
            .object("garden", "backup")
    }

    #[tokio::test]
    async fn maps_decisions() {
        assert!(require(&Fixed(Ok(Decision::Allow)), &attrs()).await.is_ok());

        let err = require(&Fixed(Ok(Decision::Deny(String::new()))), &attrs())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Forbidden(_)));
        assert_eq!(
            err.to_string(),
            r#"user "alice" cannot get secrets "backup" in namespace "garden""#
        );

        let err = require(&Fixed(Err(anyhow::anyhow!("timeout"))), &attrs())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
