use crate::core::{self, Attributes, Decoder, Kind, Object, Operation, Pipeline, User};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use k8s_openapi::api::authentication::v1::UserInfo;
use kube::core::DynamicObject;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Serves `AdmissionReview`s through the plugin pipeline.
#[derive(Clone)]
pub struct Admission {
    pipeline: Arc<Pipeline>,
    decoder: Arc<Decoder>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[from] hyper::Error),

    #[error("failed to encode json response: {0}")]
    Json(#[from] serde_json::Error),
}

type AdmissionRequest = kube::core::admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = kube::core::admission::AdmissionResponse;
type AdmissionReview = kube::core::admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

// === impl Admission ===

impl tower::Service<Request<hyper::body::Incoming>> for Admission {
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<hyper::body::Incoming>) -> Self::Future {
        trace!(?req);
        if req.method() != http::Method::POST || req.uri().path() != "/" {
            return Box::pin(future::ready(empty_response(http::StatusCode::NOT_FOUND)));
        }

        let admission = self.clone();
        Box::pin(async move {
            use bytes::Buf;
            let bytes = req.into_body().collect().await?.to_bytes();
            let review: AdmissionReview = match serde_json::from_reader(bytes.reader()) {
                Ok(review) => review,
                Err(error) => {
                    warn!(%error, "Failed to parse request body");
                    return json_response(AdmissionResponse::invalid(error).into_review());
                }
            };
            trace!(?review);

            let rsp = match review.try_into() {
                Ok(req) => {
                    debug!(?req);
                    admission.admit(req).await
                }
                Err(error) => {
                    warn!(%error, "Invalid admission request");
                    AdmissionResponse::invalid(error)
                }
            };
            debug!(allowed = rsp.allowed, "Responding");
            json_response(rsp.into_review())
        })
    }
}

impl Admission {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            decoder: Arc::new(Decoder::new()),
        }
    }

    async fn admit(self, req: AdmissionRequest) -> AdmissionResponse {
        let rsp = AdmissionResponse::from(&req);

        let Some(kind) = self.decoder.lookup(&req.kind.group, &req.kind.kind) else {
            trace!(group = %req.kind.group, kind = %req.kind.kind, "Unsupported kind");
            return rsp;
        };
        if !self.pipeline.handles(kind) {
            return rsp;
        }

        let mut attrs = match self.attributes(kind, req) {
            Ok(attrs) => attrs,
            Err(error) => {
                info!(%error, kind = kind.as_str(), "Failed to decode object");
                let mut rsp = rsp.deny(error);
                rsp.result.code = 400;
                rsp.result.reason = "BadRequest".to_string();
                return rsp;
            }
        };
        let before = attrs.object.clone();

        match self.pipeline.admit(&mut attrs).await {
            Ok(false) => rsp,
            Ok(true) => match patch(before.as_ref(), attrs.object.as_ref()) {
                Ok(patch) => rsp.clone().with_patch(patch).unwrap_or_else(|error| {
                    warn!(%error, "Failed to serialize patch");
                    deny(rsp, &core::Error::internal(error))
                }),
                Err(error) => deny(rsp, &core::Error::internal(error)),
            },
            Err(error) => deny(rsp, &error),
        }
    }

    fn attributes(&self, kind: Kind, req: AdmissionRequest) -> anyhow::Result<Attributes> {
        let decode = |obj: Option<DynamicObject>| -> anyhow::Result<Option<Object>> {
            obj.map(|obj| -> anyhow::Result<Object> {
                let value = serde_json::to_value(obj)?;
                Ok(self.decoder.decode(kind, value)?)
            })
            .transpose()
        };

        Ok(Attributes {
            kind,
            namespace: req.namespace.unwrap_or_default(),
            name: req.name,
            subresource: req.sub_resource.unwrap_or_default(),
            operation: operation(&req.operation),
            user: user(req.user_info),
            dry_run: req.dry_run,
            object: decode(req.object)?,
            old_object: decode(req.old_object)?,
        })
    }
}

fn operation(op: &kube::core::admission::Operation) -> Operation {
    use kube::core::admission::Operation as Op;
    match op {
        Op::Create => Operation::Create,
        Op::Update => Operation::Update,
        Op::Delete => Operation::Delete,
        Op::Connect => Operation::Connect,
    }
}

fn user(info: UserInfo) -> User {
    User {
        name: info.username.unwrap_or_default(),
        uid: info.uid.unwrap_or_default(),
        groups: info.groups.unwrap_or_default(),
        extra: info.extra.unwrap_or_default(),
    }
}

/// The JSON patch that turns the typed object as received into the mutated one.
///
/// Both sides are serialized from the typed model, so fields the model does not know are never
/// part of the patch.
fn patch(
    before: Option<&Object>,
    after: Option<&Object>,
) -> serde_json::Result<json_patch::Patch> {
    let to_value = |obj: Option<&Object>| match obj {
        Some(obj) => obj.to_value(),
        None => Ok(serde_json::Value::Null),
    };
    Ok(json_patch::diff(&to_value(before)?, &to_value(after)?))
}

fn deny(rsp: AdmissionResponse, error: &core::Error) -> AdmissionResponse {
    let mut rsp = rsp.deny(error);
    rsp.result.code = error.code();
    rsp.result.reason = error.reason().to_string();
    rsp
}

fn json_response(rsp: AdmissionReview) -> Result<Response<Body>, Error> {
    let bytes = serde_json::to_vec(&rsp)?;
    let mut rsp = Response::new(Body::from(bytes));
    rsp.headers_mut().insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    Ok(rsp)
}

fn empty_response(status: http::StatusCode) -> Result<Response<Body>, Error> {
    let mut rsp = Response::new(Body::default());
    *rsp.status_mut() = status;
    Ok(rsp)
}

#[cfg(test)]
mod tests;
