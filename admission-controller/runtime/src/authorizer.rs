use crate::core::{AuthorizationAttributes, Authorize, Decision};
use anyhow::Context;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SubjectAccessReview, SubjectAccessReviewSpec,
};
use kube::api::{Api, PostParams};
use tracing::trace;

/// Answers authorization questions by creating `SubjectAccessReview`s.
#[derive(Clone)]
pub struct SubjectAccessReviewer {
    client: kube::Client,
}

impl SubjectAccessReviewer {
    pub fn new(client: kube::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl Authorize for SubjectAccessReviewer {
    async fn authorize(&self, attrs: &AuthorizationAttributes) -> anyhow::Result<Decision> {
        let api = Api::<SubjectAccessReview>::all(self.client.clone());
        let review = api
            .create(&PostParams::default(), &review_for(attrs))
            .await
            .context("failed to create SubjectAccessReview")?;
        let status = review
            .status
            .context("SubjectAccessReview has no status")?;
        trace!(?status, %attrs);

        if let Some(error) = status.evaluation_error.filter(|e| !e.is_empty()) {
            if !status.allowed {
                anyhow::bail!("authorization could not be evaluated: {error}");
            }
        }
        if status.allowed {
            return Ok(Decision::Allow);
        }
        Ok(Decision::Deny(status.reason.unwrap_or_default()))
    }
}

fn review_for(attrs: &AuthorizationAttributes) -> SubjectAccessReview {
    let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
    let user = &attrs.user;
    SubjectAccessReview {
        spec: SubjectAccessReviewSpec {
            user: non_empty(&user.name),
            uid: non_empty(&user.uid),
            groups: (!user.groups.is_empty()).then(|| user.groups.clone()),
            extra: (!user.extra.is_empty()).then(|| user.extra.clone()),
            resource_attributes: Some(ResourceAttributes {
                verb: non_empty(&attrs.verb),
                group: Some(attrs.group.clone()),
                resource: non_empty(&attrs.resource),
                subresource: non_empty(&attrs.subresource),
                namespace: non_empty(&attrs.namespace),
                name: non_empty(&attrs.name),
                ..Default::default()
            }),
            ..Default::default()
        },
        ..Default::default()
    }
}
