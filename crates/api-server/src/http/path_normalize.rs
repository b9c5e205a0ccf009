//! Strips a configured API Gateway / Lambda stage prefix (e.g. `/prod`) off
//! the front of every inbound path (§4.6), so route matching stays
//! stage-independent. A no-op when `STAGE_PREFIX` isn't configured.

use axum::extract::{Request, State};
use axum::http::Uri;
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;

fn strip_stage_prefix(path: &str, stage: &str) -> Option<String> {
    let stripped = path.strip_prefix('/')?.strip_prefix(stage)?;
    match stripped.strip_prefix('/') {
        Some(rest) => Some(format!("/{rest}")),
        None if stripped.is_empty() => Some("/".to_string()),
        None => None,
    }
}

pub(super) async fn strip_stage_prefix_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(stage) = state.config.stage_prefix.as_deref()
        && let Some(new_path) = strip_stage_prefix(req.uri().path(), stage)
    {
        let mut parts = req.uri().clone().into_parts();
        let new_path_and_query = match req.uri().query() {
            Some(query) => format!("{new_path}?{query}"),
            None => new_path,
        };
        if let Ok(path_and_query) = new_path_and_query.parse() {
            parts.path_and_query = Some(path_and_query);
            if let Ok(new_uri) = Uri::from_parts(parts) {
                *req.uri_mut() = new_uri;
            }
        }
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::strip_stage_prefix;

    #[test]
    fn strips_configured_stage_segment() {
        assert_eq!(
            strip_stage_prefix("/prod/advisor/policy", "prod"),
            Some("/advisor/policy".to_string())
        );
    }

    #[test]
    fn strips_bare_stage_root() {
        assert_eq!(strip_stage_prefix("/prod", "prod"), Some("/".to_string()));
    }

    #[test]
    fn leaves_non_matching_paths_untouched() {
        assert_eq!(strip_stage_prefix("/advisor/policy", "prod"), None);
        assert_eq!(strip_stage_prefix("/production/x", "prod"), None);
    }
}
