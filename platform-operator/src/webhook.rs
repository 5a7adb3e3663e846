//! Conversion and admission webhook HTTP endpoints, grounded on the
//! the `actix-web` usage in `operators/src/upgrade/rest/service.rs`
//! (`#[post(...)]` handlers returning `impl Responder`).

use actix_web::{post, web, App, HttpResponse, HttpServer, Responder};
use platform_types::spec::{v1, v1alpha1};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::admission::{apply_defaults, validate, RecordedStorageSizes};

#[derive(Debug, Deserialize)]
struct AdmissionReview {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    request: AdmissionRequest,
}

#[derive(Debug, Deserialize)]
struct AdmissionRequest {
    uid: String,
    object: Value,
}

#[derive(Debug, Serialize)]
struct AdmissionReviewResponse {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    response: AdmissionResponseBody,
}

#[derive(Debug, Serialize)]
struct AdmissionResponseBody {
    uid: String,
    allowed: bool,
    status: Option<AdmissionStatus>,
    #[serde(rename = "patchType", skip_serializing_if = "Option::is_none")]
    patch_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    patch: Option<String>,
}

#[derive(Debug, Serialize)]
struct AdmissionStatus {
    message: String,
}

/// Validating and mutating webhook in one endpoint, matching the
/// style of a small number of broad handlers rather than one
/// per verb. The defaulter runs first (pure mutation), the validator
/// second (pure predicate).
#[post("/admit")]
async fn admit(body: web::Json<AdmissionReview>) -> impl Responder {
    let review = body.into_inner();

    let mut platform: v1::Platform = match serde_json::from_value(review.request.object.clone()) {
        Ok(p) => p,
        Err(source) => {
            return HttpResponse::Ok().json(AdmissionReviewResponse {
                api_version: review.api_version,
                kind: review.kind,
                response: AdmissionResponseBody {
                    uid: review.request.uid,
                    allowed: false,
                    status: Some(AdmissionStatus {
                        message: format!("could not decode object: {source}"),
                    }),
                    patch_type: None,
                    patch: None,
                },
            });
        }
    };

    let original = platform.spec.clone();
    apply_defaults(&mut platform.spec);

    let errors = validate(&platform.spec, &RecordedStorageSizes::default());
    if !errors.is_empty() {
        let message = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return HttpResponse::Ok().json(AdmissionReviewResponse {
            api_version: review.api_version,
            kind: review.kind,
            response: AdmissionResponseBody {
                uid: review.request.uid,
                allowed: false,
                status: Some(AdmissionStatus { message }),
                patch_type: None,
                patch: None,
            },
        });
    }

    let patch = if platform.spec == original {
        None
    } else {
        Some(json_patch_replace_spec(&platform.spec))
    };

    HttpResponse::Ok().json(AdmissionReviewResponse {
        api_version: review.api_version,
        kind: review.kind,
        response: AdmissionResponseBody {
            uid: review.request.uid,
            allowed: true,
            status: None,
            patch_type: patch.as_ref().map(|_| "JSONPatch".to_string()),
            patch,
        },
    })
}

fn json_patch_replace_spec(spec: &v1::PlatformSpec) -> String {
    let patch = serde_json::json!([{ "op": "replace", "path": "/spec", "value": spec }]);
    let bytes = serde_json::to_vec(&patch).expect("patch serializes");
    base64_encode(&bytes)
}

fn base64_encode(bytes: &[u8]) -> String {
    const TABLE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
    let mut out = String::with_capacity(bytes.len().div_ceil(3) * 4);
    for chunk in bytes.chunks(3) {
        let b0 = chunk[0];
        let b1 = *chunk.get(1).unwrap_or(&0);
        let b2 = *chunk.get(2).unwrap_or(&0);
        out.push(TABLE[(b0 >> 2) as usize] as char);
        out.push(TABLE[(((b0 & 0x03) << 4) | (b1 >> 4)) as usize] as char);
        out.push(if chunk.len() > 1 {
            TABLE[(((b1 & 0x0f) << 2) | (b2 >> 6)) as usize] as char
        } else {
            '='
        });
        out.push(if chunk.len() > 2 {
            TABLE[(b2 & 0x3f) as usize] as char
        } else {
            '='
        });
    }
    out
}

#[derive(Debug, Deserialize)]
struct ConversionReview {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    request: ConversionRequest,
}

#[derive(Debug, Deserialize)]
struct ConversionRequest {
    uid: String,
    #[serde(rename = "desiredAPIVersion")]
    desired_api_version: String,
    objects: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ConversionReviewResponse {
    #[serde(rename = "apiVersion")]
    api_version: String,
    kind: String,
    response: ConversionResponseBody,
}

#[derive(Debug, Serialize)]
struct ConversionResponseBody {
    uid: String,
    result: ConversionResult,
    #[serde(rename = "convertedObjects")]
    converted_objects: Vec<Value>,
}

#[derive(Debug, Serialize)]
struct ConversionResult {
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

/// Batch-converts every object in the request to `desiredAPIVersion`,
/// stateless and idempotent so Kubernetes can retry it freely.
#[post("/convert")]
async fn convert(body: web::Json<ConversionReview>) -> impl Responder {
    let review = body.into_inner();
    let mut converted = Vec::with_capacity(review.request.objects.len());
    let mut failure = None;

    for object in &review.request.objects {
        let result = convert_one(object, &review.request.desired_api_version);
        match result {
            Ok(value) => converted.push(value),
            Err(message) => {
                failure = Some(message);
                break;
            }
        }
    }

    let result = match &failure {
        Some(message) => ConversionResult {
            status: "Failure".to_string(),
            message: Some(message.clone()),
        },
        None => ConversionResult {
            status: "Success".to_string(),
            message: None,
        },
    };

    HttpResponse::Ok().json(ConversionReviewResponse {
        api_version: review.api_version,
        kind: review.kind,
        response: ConversionResponseBody {
            uid: review.request.uid,
            result,
            converted_objects: if failure.is_some() { Vec::new() } else { converted },
        },
    })
}

fn convert_one(object: &Value, desired_api_version: &str) -> Result<Value, String> {
    let api_version = object
        .get("apiVersion")
        .and_then(Value::as_str)
        .ok_or_else(|| "object has no apiVersion".to_string())?;

    match (api_version, desired_api_version) {
        (from, to) if from == to => Ok(object.clone()),
        ("observability.platform.io/v1alpha1", "observability.platform.io/v1") => {
            let spoke: v1alpha1::Platform =
                serde_json::from_value(object.clone()).map_err(|e| e.to_string())?;
            let hub = platform_types::convert::to_hub(&spoke);
            serde_json::to_value(hub).map_err(|e| e.to_string())
        }
        ("observability.platform.io/v1", "observability.platform.io/v1alpha1") => {
            let hub: v1::Platform = serde_json::from_value(object.clone()).map_err(|e| e.to_string())?;
            let spoke = platform_types::convert::from_hub(&hub);
            serde_json::to_value(spoke).map_err(|e| e.to_string())
        }
        (from, to) => Err(platform_types::Error::WrongHubType {
            expected: to.to_string(),
            actual: from.to_string(),
        }
        .to_string()),
    }
}

pub async fn serve(addr: &str) -> std::io::Result<()> {
    let addr = addr.to_string();
    HttpServer::new(|| App::new().service(admit).service(convert))
        .bind(addr)?
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_encode_matches_known_vector() {
        assert_eq!(base64_encode(b"hello"), "aGVsbG8=");
        assert_eq!(base64_encode(b"hi"), "aGk=");
        assert_eq!(base64_encode(b""), "");
    }

    #[test]
    fn convert_one_is_identity_when_versions_match() {
        let object = serde_json::json!({ "apiVersion": "observability.platform.io/v1", "kind": "Platform" });
        let result = convert_one(&object, "observability.platform.io/v1").unwrap();
        assert_eq!(result, object);
    }

    #[test]
    fn convert_one_rejects_unknown_pair() {
        let object = serde_json::json!({ "apiVersion": "example.com/v1", "kind": "Widget" });
        assert!(convert_one(&object, "observability.platform.io/v1").is_err());
    }
}
