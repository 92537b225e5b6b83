use std::path::PathBuf;

use log::{error, info, warn};
use thiserror::Error;

use crate::config::{parse_sizes_csv, Config};
use crate::protocol::{CalcRequest, CalcResponse, HttpRequest, HttpResponse, HttpStatus, Method, PackOut};
use crate::solver::{self, Solution};

/// A request refused before or by the optimizer. The message is sent to the client verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    BadRequest(String),
    #[error("internal error")]
    Internal,
}

impl Rejection {
    fn status(&self) -> HttpStatus {
        match self {
            Rejection::MethodNotAllowed => HttpStatus::MethodNotAllowed,
            Rejection::BadRequest(_) => HttpStatus::BadRequest,
            Rejection::Internal => HttpStatus::InternalServerError,
        }
    }
}

impl From<solver::SolveError> for Rejection {
    fn from(err: solver::SolveError) -> Self {
        Rejection::BadRequest(err.to_string())
    }
}

fn bad_request(msg: impl Into<String>) -> Rejection {
    Rejection::BadRequest(msg.into())
}

/// Routes requests and answers them. Shared by every connection.
pub(crate) struct RequestProcessor {
    default_sizes: Vec<i64>,
    max_items: i64,
    max_sizes: usize,
    ui: PathBuf,
}

impl RequestProcessor {
    pub(crate) fn new(config: &Config) -> RequestProcessor {
        RequestProcessor {
            default_sizes: config.default_sizes().to_vec(),
            max_items: config.max_items,
            max_sizes: config.max_sizes,
            ui: config.ui.clone(),
        }
    }

    pub(crate) async fn handle(&self, request: &HttpRequest) -> HttpResponse {
        if request.method == Method::Options {
            return HttpResponse::no_content();
        }
        match &*request.path() {
            "/api/calc" => match self.calc(request).await {
                Ok(response) => response,
                Err(rejection) => {
                    warn!("calc rejected target={} reason={}", request.target, rejection);
                    HttpResponse::text(rejection.status(), rejection.to_string())
                }
            },
            "/health" => HttpResponse::text(HttpStatus::Ok, "ok"),
            _ => self.ui().await,
        }
    }

    async fn calc(&self, request: &HttpRequest) -> Result<HttpResponse, Rejection> {
        let CalcRequest { items, sizes } = calc_request(request)?;
        let sizes = self.catalog(sizes)?;
        if items > self.max_items {
            return Err(bad_request(format!("items must be <= {}", self.max_items)));
        }

        let solution = {
            let sizes = sizes.clone();
            // the table can be large; keep it off the reactor threads
            tokio::task::spawn_blocking(move || solver::solve(items, &sizes))
                .await
                .map_err(|err| {
                    error!("optimizer task failed: {}", err);
                    Rejection::Internal
                })??
        };
        info!(
            "calc handled items={} sizes={:?} total={} packs={:?}",
            items,
            sizes,
            solution.total(),
            solution.packs()
        );

        let body = serde_json::to_vec(&render(items, &solution)).map_err(|err| {
            error!("could not encode response: {}", err);
            Rejection::Internal
        })?;
        Ok(HttpResponse::json(body))
    }

    /// Falls back to the configured catalog when the request names none.
    fn catalog(&self, sizes: Option<Vec<i64>>) -> Result<Vec<i64>, Rejection> {
        let sizes = match sizes {
            Some(sizes) if !sizes.is_empty() => sizes,
            _ if !self.default_sizes.is_empty() => self.default_sizes.clone(),
            _ => {
                return Err(bad_request(
                    "PACK_SIZES is empty; provide sizes in request or set env var",
                ));
            }
        };
        let mut distinct = sizes.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if distinct.len() > self.max_sizes {
            return Err(bad_request(format!("at most {} pack sizes are allowed", self.max_sizes)));
        }
        if sizes.iter().any(|&size| size > self.max_items) {
            return Err(bad_request(format!("pack sizes must be <= {}", self.max_items)));
        }
        Ok(sizes)
    }

    async fn ui(&self) -> HttpResponse {
        match tokio::fs::read(&self.ui).await {
            Ok(page) => HttpResponse::html(page),
            Err(err) => {
                warn!("could not read {}: {}", self.ui.display(), err);
                HttpResponse::text(HttpStatus::NotFound, "404 page not found")
            }
        }
    }
}

/// Extracts items and sizes from the query string (GET) or a JSON body (POST).
fn calc_request(request: &HttpRequest) -> Result<CalcRequest, Rejection> {
    let req = match request.method {
        Method::Get => {
            let query = request.query();
            let items = match query.get("items").map(String::as_str) {
                None | Some("") => return Err(bad_request("missing items")),
                Some(items) => items
                    .trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|&items| items > 0)
                    .ok_or_else(|| bad_request("items must be a positive integer"))?,
            };
            let sizes = match query.get("sizes").map(String::as_str) {
                None | Some("") => None,
                Some(csv) => Some(parse_sizes_csv(csv).map_err(Rejection::BadRequest)?),
            };
            CalcRequest { items, sizes }
        }
        Method::Post => serde_json::from_slice(&request.body).map_err(|_| bad_request("invalid JSON body"))?,
        _ => return Err(Rejection::MethodNotAllowed),
    };
    if req.items <= 0 {
        return Err(bad_request("items must be > 0"));
    }
    Ok(req)
}

fn render(items: i64, solution: &Solution) -> CalcResponse {
    CalcResponse {
        items_ordered: items,
        total_items: solution.total(),
        packs: solution
            .packs_desc()
            .into_iter()
            .map(|(size, qty)| PackOut { size, qty })
            .collect(),
    }
}
