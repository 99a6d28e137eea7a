//! Read-only HTTP view of the catalog and mapping (made by FontLab https://www.fontlab.com/)
//!
//! A small window onto the artifacts the other commands produce. Nothing
//! here writes: the catalog and mapping are loaded once, shared behind an
//! `Arc`, and every request just looks things up. Handy for a preview site
//! or for eyeballing which families still need a polyfill pass.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::{Path as UrlPath, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{info, warn};

use fontmap_core::catalog::{family_to_id, Catalog, CatalogEntry};
use fontmap_core::mapping::{FamilyMapping, MappingStore};
use fontmap_core::variant::VariantKey;

pub const DEFAULT_LIMIT: usize = 100;

/// Artifacts loaded once at startup.
///
/// Cloning is cheap: both halves sit behind an `Arc`, so every handler gets
/// its own handle to the same catalog and mapping.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    catalog: Arc<Catalog>,
    mapping: Arc<MappingStore>,
}

impl AppState {
    pub fn new(catalog: Catalog, mapping: MappingStore) -> Self {
        Self {
            catalog: Arc::new(catalog),
            mapping: Arc::new(mapping),
        }
    }

    /// A missing mapping artifact serves the catalog alone.
    pub fn load(catalog: &Path, mapping: &Path) -> Result<Self> {
        let catalog = Catalog::load(catalog)?;
        let mapping = if mapping.exists() {
            MappingStore::load(mapping)?
        } else {
            warn!(path = %mapping.display(), "no mapping artifact; serving catalog only");
            MappingStore::new()
        };
        Ok(Self::new(catalog, mapping))
    }
}

/// Query string accepted by `GET /families`.
///
/// Every field is optional. With nothing set you get the first
/// [`DEFAULT_LIMIT`] catalog families in identity order; each filter you add
/// narrows that list before the limit is applied.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FamilyQuery {
    /// Substring of family, category or variant key
    pub q: Option<String>,
    /// `variable` or `static`
    pub property: Option<String>,
    /// Exact category, case-insensitive
    pub category: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FamilySummary {
    pub id: String,
    pub family: String,
    pub category: String,
    pub variants: Vec<VariantKey>,
    pub variable: bool,
    pub mapped: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FamilyList {
    pub families: Vec<FamilySummary>,
    /// Matches before the limit was applied.
    pub total: usize,
}

/// One `@font-face` worth of data for a catalog file.
#[derive(Debug, Serialize, Deserialize)]
pub struct FontFace {
    pub variant: VariantKey,
    pub font_weight: String,
    pub font_style: String,
    pub src: String,
}

/// Everything known about one family: what the catalog advertises, how a
/// browser would load each file, and the PostScript names bound to them.
///
/// `mapping` is `None` for families the mapper never saw, for example
/// folders excluded by pre-validation.
#[derive(Debug, Serialize, Deserialize)]
pub struct FamilyDetail {
    pub id: String,
    pub catalog: CatalogEntry,
    pub faces: Vec<FontFace>,
    pub mapping: Option<FamilyMapping>,
}

/// Bind `bind` and serve until the process is stopped.
pub async fn serve(bind: &str, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding HTTP server to {bind}"))?;
    info!(bind, "serving");

    axum::serve(listener, router(state))
        .await
        .context("serving HTTP")?;
    Ok(())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/families", get(list_families))
        .route("/families/:id", get(family_detail))
        .with_state(state)
}

async fn list_families(
    State(state): State<AppState>,
    Query(query): Query<FamilyQuery>,
) -> Result<Json<FamilyList>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            "limit must be at least 1 when provided".to_string(),
        ));
    }
    let want_variable = match query.property.as_deref() {
        None | Some("") => None,
        Some("variable") => Some(true),
        Some("static") => Some(false),
        Some(other) => {
            return Err((
                StatusCode::BAD_REQUEST,
                format!("unknown property {other:?}; expected variable or static"),
            ))
        }
    };

    let matches: Vec<&CatalogEntry> = state
        .catalog
        .search(query.q.as_deref().unwrap_or(""))
        .into_iter()
        .filter(|entry| want_variable.map_or(true, |v| (!entry.axes.is_empty()) == v))
        .filter(|entry| {
            query
                .category
                .as_deref()
                .map_or(true, |c| entry.category.eq_ignore_ascii_case(c))
        })
        .collect();

    let total = matches.len();
    let families = matches
        .into_iter()
        .take(limit)
        .map(|entry| FamilySummary {
            id: family_to_id(&entry.family),
            family: entry.family.clone(),
            category: entry.category.clone(),
            variants: entry.variants.clone(),
            variable: !entry.axes.is_empty(),
            mapped: state.mapping.find(&entry.family).is_some(),
        })
        .collect();

    Ok(Json(FamilyList { families, total }))
}

async fn family_detail(
    State(state): State<AppState>,
    UrlPath(id): UrlPath<String>,
) -> Result<Json<FamilyDetail>, (StatusCode, String)> {
    // slugs normalize to the same identity as the family name
    let entry = state
        .catalog
        .lookup(&id)
        .ok_or_else(|| (StatusCode::NOT_FOUND, format!("family not found: {id}")))?;

    let faces = entry
        .files
        .iter()
        .map(|(variant, src)| {
            let (font_weight, font_style) = variant.css();
            FontFace {
                variant: *variant,
                font_weight,
                font_style: font_style.to_string(),
                src: src.clone(),
            }
        })
        .collect();

    Ok(Json(FamilyDetail {
        id: family_to_id(&entry.family),
        catalog: entry.clone(),
        faces,
        mapping: state.mapping.find(&entry.family).cloned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    const CATALOG: &str = r#"{"items": [
      {"family": "Open Sans", "category": "sans-serif", "variants": ["regular", "700"],
       "files": {"regular": "https://x/a.ttf", "700": "https://x/b.ttf"},
       "axes": [{"tag": "wght", "start": 300, "end": 800}]},
      {"family": "Lora", "category": "serif", "variants": ["regular", "italic"],
       "files": {"regular": "https://x/c.ttf", "italic": "https://x/d.ttf"}}
    ]}"#;

    fn state() -> AppState {
        let catalog = Catalog::from_json(CATALOG).expect("catalog");
        let mut mapping = MappingStore::new();
        let mut lora = FamilyMapping::from_catalog(catalog.lookup("Lora").expect("lora"));
        lora.bind("Lora-Regular", VariantKey::REGULAR);
        mapping.insert(lora);
        AppState::new(catalog, mapping)
    }

    async fn get_json(uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::get(uri).body(Body::empty()).unwrap();
        let response = router(state()).oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let (status, body) = get_json("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn families_filter_by_query_and_property() {
        let (status, body) = get_json("/families?q=serif").await;
        assert_eq!(status, StatusCode::OK);
        let list: FamilyList = serde_json::from_slice(&body).expect("parse");
        assert_eq!(list.total, 2);

        let (_, body) = get_json("/families?property=variable").await;
        let list: FamilyList = serde_json::from_slice(&body).expect("parse");
        assert_eq!(list.families.len(), 1);
        assert_eq!(list.families[0].id, "open-sans");
        assert!(!list.families[0].mapped);

        let (_, body) = get_json("/families?category=SERIF&limit=1").await;
        let list: FamilyList = serde_json::from_slice(&body).expect("parse");
        assert_eq!(list.families[0].family, "Lora");
        assert!(list.families[0].mapped);
    }

    #[tokio::test]
    async fn families_reject_zero_limit() {
        let (status, body) = get_json("/families?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let text = String::from_utf8(body).expect("utf8 body");
        assert!(text.contains("limit must be at least 1"), "body: {text}");
    }

    #[tokio::test]
    async fn family_detail_by_slug() {
        let (status, body) = get_json("/families/lora").await;
        assert_eq!(status, StatusCode::OK);
        let detail: FamilyDetail = serde_json::from_slice(&body).expect("parse");
        assert_eq!(detail.catalog.family, "Lora");
        assert_eq!(detail.faces.len(), 2);
        assert_eq!(detail.faces[1].font_style, "italic");
        assert_eq!(detail.faces[1].font_weight, "400");
        let mapping = detail.mapping.expect("mapping present");
        assert_eq!(mapping.post_script_names["Lora-Regular"], VariantKey::REGULAR);

        let (status, _) = get_json("/families/open-sans").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_family_is_404() {
        let (status, body) = get_json("/families/no-such-font").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(String::from_utf8_lossy(&body).contains("family not found"));
    }
}
