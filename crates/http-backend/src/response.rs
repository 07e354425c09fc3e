use docchat_api::ErrorKind;
use mime::Mime;
use reqwest::header::{self, HeaderMap};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::Error;
use crate::proto::ErrorBody;

/// Maps a non-success status to the error kind the controller acts on.
#[inline]
pub fn classify_status(status: StatusCode) -> Option<ErrorKind> {
    if status.is_success() {
        return None;
    }
    Some(match status {
        StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        _ => ErrorKind::Server,
    })
}

pub async fn check_status(resp: Response) -> Result<Response, Error> {
    let status = resp.status();
    let Some(kind) = classify_status(status) else {
        return Ok(resp);
    };
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|body| body.message())
        .unwrap_or_else(|_| status.to_string());
    debug!("request failed with {status}: {message}");
    Err(Error::new(message, kind))
}

pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<Mime>().ok())
        .map(|m| {
            m.type_() == mime::APPLICATION
                && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        })
        .unwrap_or(false)
}

pub async fn decode_json<T: DeserializeOwned>(resp: Response) -> Result<T, Error> {
    let resp = check_status(resp).await?;
    if !is_json(resp.headers()) {
        let content_type = resp.headers().get(header::CONTENT_TYPE).cloned();
        return Err(Error::new(
            format!("Unexpected content type: {content_type:?}"),
            ErrorKind::Transport,
        ));
    }
    let body = resp.bytes().await.map_err(Error::from_reqwest)?;
    serde_json::from_slice(&body)
        .map_err(|err| Error::new(format!("{err}"), ErrorKind::Transport))
}

/// Checks the status and throws the body away.
pub async fn discard_body(resp: Response) -> Result<(), Error> {
    check_status(resp).await.map(|_| ())
}

#[cfg(test)]
mod tests {
    use reqwest::header::HeaderValue;

    use super::*;

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(StatusCode::OK), None);
        assert_eq!(classify_status(StatusCode::NO_CONTENT), None);
        assert_eq!(
            classify_status(StatusCode::UNAUTHORIZED),
            Some(ErrorKind::Unauthorized)
        );
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            Some(ErrorKind::NotFound)
        );
        assert_eq!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR),
            Some(ErrorKind::Server)
        );
        assert_eq!(
            classify_status(StatusCode::BAD_REQUEST),
            Some(ErrorKind::Server)
        );
    }

    #[test]
    fn test_is_json() {
        let mut headers = HeaderMap::new();
        assert!(!is_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        assert!(is_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/problem+json"),
        );
        assert!(is_json(&headers));

        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/html"),
        );
        assert!(!is_json(&headers));
    }
}
