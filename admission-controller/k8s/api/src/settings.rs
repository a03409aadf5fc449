//! Types of the `settings.gardener.cloud` API group.

use crate::{
    garden::shoot::{OidcClientAuthentication, OidcConfig},
    labels,
};
use kube::CustomResource;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// OIDC settings applied to new Shoots whose labels match the selector.
#[derive(Clone, Debug, Default, PartialEq, CustomResource, Deserialize, Serialize)]
#[kube(
    group = "settings.gardener.cloud",
    version = "v1alpha1",
    kind = "OpenIDConnectPreset",
    namespaced,
    derive = "Default",
    derive = "PartialEq",
    schema = "disabled"
)]
#[serde(rename_all = "camelCase")]
pub struct OpenIDConnectPresetSpec {
    #[serde(default)]
    pub server: KubeApiServerOpenIDConnect,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<OpenIDConnectClientAuthentication>,
    /// An unset selector matches no Shoot; an empty one matches every Shoot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shoot_selector: Option<labels::Selector>,
    #[serde(default)]
    pub weight: i32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KubeApiServerOpenIDConnect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,
    #[serde(default, rename = "clientID")]
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_prefix: Option<String>,
    #[serde(default, rename = "issuerURL")]
    pub issuer_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_claims: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signing_algs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_claim: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenIDConnectClientAuthentication {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_config: Option<BTreeMap<String, String>>,
}

impl OpenIDConnectPresetSpec {
    /// The Shoot OIDC configuration this preset describes.
    pub fn to_oidc_config(&self) -> OidcConfig {
        let server = &self.server;
        OidcConfig {
            ca_bundle: server.ca_bundle.clone(),
            client_authentication: self.client.as_ref().map(|c| OidcClientAuthentication {
                extra_config: c.extra_config.clone(),
                secret: c.secret.clone(),
            }),
            client_id: Some(server.client_id.clone()),
            groups_claim: server.groups_claim.clone(),
            groups_prefix: server.groups_prefix.clone(),
            issuer_url: Some(server.issuer_url.clone()),
            required_claims: server.required_claims.clone(),
            signing_algs: server.signing_algs.clone(),
            username_claim: server.username_claim.clone(),
            username_prefix: server.username_prefix.clone(),
        }
    }
}
