//! Route definitions for the VPP simulator.
//!
//! Implements the operations `vpp-client` dispatches to, answering with the
//! service's flat JSON envelope: HTTP 200 with `status: 0` and payload fields
//! on success, `status: -1` with `errorNumber`/`errorMessage` on failure.
//! Every POST must carry the configured `sToken`.
//!
//! | Method | Path | Operation key |
//! |--------|------|---------------|
//! | GET  | `/VPPServiceConfigSrv` | (bootstrap) |
//! | POST | `/registerVPPUserSrv` | `registerUserSrvUrl` |
//! | POST | `/getVPPUserSrv` | `getUserSrvUrl` |
//! | POST | `/getVPPUsersSrv` | `getUsersSrvUrl` |
//! | POST | `/retireVPPUserSrv` | `retireUserSrvUrl` |
//! | POST | `/editVPPUserSrv` | `editUserSrvUrl` |
//! | POST | `/getVPPLicensesSrv` | `getLicensesSrvUrl` |
//! | POST | `/associateVPPLicenseWithVPPUserSrv` | `associateLicenseSrvUrl` |
//! | POST | `/disassociateVPPLicenseFromVPPUserSrv` | `disassociateLicenseSrvUrl` |
//! | POST | `/manageVPPLicensesByAdamIdSrv` | `manageVPPLicensesByAdamIdSrvUrl` |
//! | POST | `/getVPPAssetsSrv` | `getVPPAssetsSrvUrl` |
//! | POST | `/VPPClientConfigSrv` | `clientConfigSrvUrl` |
//!
//! `GET /health` and `POST /sim/overload` sit outside the overload gate.

use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::store::{parse_since_token, AppState, SimLicense, SimUser};

// ── Error catalogue ─────────────────────────────────────────────────

const MISSING_ARGUMENT: (i64, &str) = (9600, "Missing required argument");
const INVALID_ARGUMENT: (i64, &str) = (9602, "Invalid argument");
const USER_NOT_FOUND: (i64, &str) = (9609, "Registered user not found");
const LICENSE_NOT_FOUND: (i64, &str) = (9610, "License not found");
const LICENSE_ALREADY_ASSIGNED: (i64, &str) = (9616, "License already assigned");
const LICENSE_NOT_ASSOCIATED: (i64, &str) = (9619, "License not associated");
const INVALID_TOKEN: (i64, &str) = (9625, "The sToken is invalid");

const ERROR_CATALOGUE: [(i64, &str); 7] = [
    MISSING_ARGUMENT,
    INVALID_ARGUMENT,
    USER_NOT_FOUND,
    LICENSE_NOT_FOUND,
    LICENSE_ALREADY_ASSIGNED,
    LICENSE_NOT_ASSOCIATED,
    INVALID_TOKEN,
];

/// Operation key → route, as published in the bootstrap document.
const OPERATIONS: [(&str, &str); 11] = [
    ("registerUserSrvUrl", "registerVPPUserSrv"),
    ("getUserSrvUrl", "getVPPUserSrv"),
    ("getUsersSrvUrl", "getVPPUsersSrv"),
    ("retireUserSrvUrl", "retireVPPUserSrv"),
    ("editUserSrvUrl", "editVPPUserSrv"),
    ("getLicensesSrvUrl", "getVPPLicensesSrv"),
    ("associateLicenseSrvUrl", "associateVPPLicenseWithVPPUserSrv"),
    ("disassociateLicenseSrvUrl", "disassociateVPPLicenseFromVPPUserSrv"),
    ("manageVPPLicensesByAdamIdSrvUrl", "manageVPPLicensesByAdamIdSrv"),
    ("getVPPAssetsSrvUrl", "getVPPAssetsSrv"),
    ("clientConfigSrvUrl", "VPPClientConfigSrv"),
];

/// A `status: -1` envelope.
#[derive(Debug)]
pub struct Fault {
    code: i64,
    message: String,
}

impl Fault {
    fn new((code, message): (i64, &str)) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    fn detail((code, message): (i64, &str), detail: impl std::fmt::Display) -> Self {
        Self {
            code,
            message: format!("{message}: {detail}"),
        }
    }
}

impl IntoResponse for Fault {
    fn into_response(self) -> Response {
        Json(json!({
            "status": -1,
            "errorNumber": self.code,
            "errorMessage": self.message,
        }))
        .into_response()
    }
}

type Reply = Result<Json<Value>, Fault>;

fn success(mut fields: Map<String, Value>) -> Reply {
    fields.insert("status".into(), json!(0));
    Ok(Json(Value::Object(fields)))
}

fn to_value<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

/// Build the complete router with all VPP simulator routes.
pub fn router(state: AppState) -> Router {
    let service = Router::new()
        .route("/VPPServiceConfigSrv", get(service_config))
        .route("/registerVPPUserSrv", post(register_user))
        .route("/getVPPUserSrv", post(get_user))
        .route("/getVPPUsersSrv", post(get_users))
        .route("/retireVPPUserSrv", post(retire_user))
        .route("/editVPPUserSrv", post(edit_user))
        .route("/getVPPLicensesSrv", post(get_licenses))
        .route("/associateVPPLicenseWithVPPUserSrv", post(associate_license))
        .route("/disassociateVPPLicenseFromVPPUserSrv", post(disassociate_license))
        .route("/manageVPPLicensesByAdamIdSrv", post(manage_licenses))
        .route("/getVPPAssetsSrv", post(get_assets))
        .route("/VPPClientConfigSrv", post(client_config))
        .layer(middleware::from_fn_with_state(state.clone(), overload_gate));

    Router::new()
        .merge(service)
        .route("/health", get(health))
        .route("/sim/overload", post(inject_overload))
        .fallback(not_implemented)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ── Overload injection ──────────────────────────────────────────────

async fn overload_gate(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match state.take_overload() {
        Some(retry_after) => {
            tracing::info!(path = %request.uri().path(), retry_after, "injecting overload");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                [(header::RETRY_AFTER, retry_after.to_string())],
            )
                .into_response()
        }
        None => next.run(request).await,
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OverloadRequest {
    count: u32,
    #[serde(default)]
    retry_after: u64,
}

async fn inject_overload(State(state): State<AppState>, Json(body): Json<OverloadRequest>) -> StatusCode {
    state.inject_overload(body.count, Duration::from_secs(body.retry_after));
    StatusCode::NO_CONTENT
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn not_implemented() -> StatusCode {
    StatusCode::NOT_IMPLEMENTED
}

// ── Request helpers ─────────────────────────────────────────────────

/// Parse a POST body and check its `sToken`.
fn authenticate(state: &AppState, body: &[u8]) -> Result<Map<String, Value>, Fault> {
    let fields: Map<String, Value> =
        serde_json::from_slice(body).map_err(|e| Fault::detail(INVALID_ARGUMENT, e))?;
    match fields.get("sToken").and_then(Value::as_str) {
        None | Some("") => Err(Fault::detail(MISSING_ARGUMENT, "sToken")),
        Some(token) if token != state.config().s_token => Err(Fault::new(INVALID_TOKEN)),
        Some(_) => Ok(fields),
    }
}

/// A non-empty string field. Numbers are accepted and rendered as text.
fn text(fields: &Map<String, Value>, name: &str) -> Option<String> {
    match fields.get(name)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn flag(fields: &Map<String, Value>, name: &str) -> bool {
    match fields.get(name) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn strings(fields: &Map<String, Value>, name: &str) -> Vec<String> {
    fields
        .get(name)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Resolve the user a request refers to, by `userId`, `clientUserIdStr` or
/// `itsIdHash`, returning its `clientUserIdStr`.
fn resolve_user(state: &AppState, fields: &Map<String, Value>) -> Result<String, Fault> {
    if let Some(id) = fields.get("userId").and_then(Value::as_i64) {
        return state
            .users()
            .iter()
            .find(|u| u.user_id == id)
            .map(|u| u.client_user_id_str.clone())
            .ok_or_else(|| Fault::new(USER_NOT_FOUND));
    }
    if let Some(id) = text(fields, "clientUserIdStr") {
        return if state.users().contains_key(&id) {
            Ok(id)
        } else {
            Err(Fault::new(USER_NOT_FOUND))
        };
    }
    if let Some(hash) = text(fields, "itsIdHash") {
        return state
            .users()
            .iter()
            .find(|u| u.its_id_hash.as_deref() == Some(hash.as_str()))
            .map(|u| u.client_user_id_str.clone())
            .ok_or_else(|| Fault::new(USER_NOT_FOUND));
    }
    Err(Fault::detail(MISSING_ARGUMENT, "userId, clientUserIdStr or itsIdHash"))
}

fn user_json(state: &AppState, client_id: &str) -> Value {
    state
        .users()
        .get(client_id)
        .map(|u| to_value(u.value()))
        .unwrap_or(Value::Null)
}

/// Serve one page of a paged listing.
///
/// `snapshot` receives the since-modified horizon (`None` for a full listing)
/// and returns the matching records in a stable order.
fn paged(
    state: &AppState,
    fields: &Map<String, Value>,
    list_key: &str,
    snapshot: impl Fn(Option<u64>) -> Vec<Value>,
) -> Result<Map<String, Value>, Fault> {
    if let Some(token) = text(fields, "batchToken") {
        let (items, horizon) = state
            .take_batch(&token)
            .ok_or_else(|| Fault::detail(INVALID_ARGUMENT, "batchToken"))?;
        return Ok(state.paginate(list_key, items, horizon));
    }

    let since = match text(fields, "sinceModifiedToken") {
        Some(token) => Some(
            parse_since_token(&token).ok_or_else(|| Fault::detail(INVALID_ARGUMENT, "sinceModifiedToken"))?,
        ),
        None => None,
    };
    let horizon = state.now();
    let items = snapshot(since);
    let total = items.len();
    let mut page = state.paginate(list_key, items, horizon);
    page.insert("totalCount".into(), json!(total));
    Ok(page)
}

// ── Bootstrap ───────────────────────────────────────────────────────

fn public_base(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(url) = &state.config().public_url {
        return url.trim_end_matches('/').to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("127.0.0.1");
    format!("http://{host}")
}

async fn service_config(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let base = public_base(&state, &headers);
    let mut fields = Map::new();
    for (key, route) in OPERATIONS {
        fields.insert(key.into(), json!(format!("{base}/{route}")));
    }
    fields.insert("vppWebsiteUrl".into(), json!(format!("{base}/")));
    fields.insert("invitationEmailUrl".into(), json!(""));
    fields.insert(
        "maxBatchAssociateLicenseCount".into(),
        json!(state.config().max_batch_associate),
    );
    fields.insert(
        "maxBatchDisassociateLicenseCount".into(),
        json!(state.config().max_batch_disassociate),
    );
    fields.insert(
        "errorCodes".into(),
        Value::Array(
            ERROR_CATALOGUE
                .iter()
                .map(|(code, message)| json!({"errorNumber": code, "errorMessage": message}))
                .collect(),
        ),
    );
    success(fields)
}

// ── Users ───────────────────────────────────────────────────────────

async fn register_user(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let client_id =
        text(&fields, "clientUserIdStr").ok_or_else(|| Fault::detail(MISSING_ARGUMENT, "clientUserIdStr"))?;

    let existing = state
        .users()
        .get(&client_id)
        .filter(|u| u.status != "Retired")
        .map(|u| to_value(u.value()));
    let user = match existing {
        Some(user) => user,
        None => {
            let code = Uuid::new_v4().simple().to_string();
            let user = SimUser {
                user_id: state.next_user_id(),
                client_user_id_str: client_id.clone(),
                email: text(&fields, "email"),
                status: "Registered",
                invite_url: format!("https://vpp-sim.invalid/invite/{code}"),
                invite_code: code,
                its_id_hash: None,
                modified: state.tick(),
            };
            let value = to_value(&user);
            state.users().insert(client_id, user);
            value
        }
    };

    let mut out = Map::new();
    out.insert("user".into(), user);
    success(out)
}

async fn get_user(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let client_id = resolve_user(&state, &fields)?;
    let mut out = Map::new();
    out.insert("user".into(), user_json(&state, &client_id));
    success(out)
}

async fn get_users(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let include_retired = flag(&fields, "includeRetired");

    let page = paged(&state, &fields, "users", |since| {
        let mut users: Vec<SimUser> = state
            .users()
            .iter()
            .filter(|u| match since {
                Some(tick) => u.modified > tick,
                None => include_retired || u.status != "Retired",
            })
            .map(|u| u.value().clone())
            .collect();
        users.sort_by_key(|u| u.user_id);
        users.iter().map(to_value).collect()
    })?;
    success(page)
}

async fn retire_user(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let client_id = resolve_user(&state, &fields)?;
    let tick = state.tick();

    for mut license in state.licenses().iter_mut() {
        if license.client_user_id_str.as_deref() == Some(client_id.as_str()) {
            license.release(tick);
        }
    }
    if let Some(mut user) = state.users().get_mut(&client_id) {
        user.status = "Retired";
        user.its_id_hash = None;
        user.modified = tick;
    }

    let mut out = Map::new();
    out.insert("user".into(), user_json(&state, &client_id));
    success(out)
}

async fn edit_user(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let client_id = resolve_user(&state, &fields)?;
    let email = text(&fields, "email").ok_or_else(|| Fault::detail(MISSING_ARGUMENT, "email"))?;

    if let Some(mut user) = state.users().get_mut(&client_id) {
        user.email = Some(email);
        user.modified = state.tick();
    }

    let mut out = Map::new();
    out.insert("user".into(), user_json(&state, &client_id));
    success(out)
}

// ── Licenses ────────────────────────────────────────────────────────

async fn get_licenses(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let adam_id = text(&fields, "adamId");
    let pricing = text(&fields, "pricingParam");
    let assigned_only = flag(&fields, "assignedOnly");

    let page = paged(&state, &fields, "licenses", |since| {
        let mut licenses: Vec<SimLicense> = state
            .licenses()
            .iter()
            .filter(|l| since.map_or(true, |tick| l.modified > tick))
            .filter(|l| adam_id.as_deref().map_or(true, |id| l.adam_id_str == id))
            .filter(|l| pricing.as_deref().map_or(true, |p| l.pricing_param == p))
            .filter(|l| !assigned_only || l.is_assigned())
            .map(|l| l.value().clone())
            .collect();
        licenses.sort_by(|a, b| a.license_id_str.cmp(&b.license_id_str));
        licenses.iter().map(to_value).collect()
    })?;
    success(page)
}

/// Find an unassigned license for a product.
fn free_license(state: &AppState, adam_id: &str, pricing: Option<&str>) -> Option<String> {
    let mut free: Vec<String> = state
        .licenses()
        .iter()
        .filter(|l| l.adam_id_str == adam_id && !l.is_assigned())
        .filter(|l| pricing.map_or(true, |p| l.pricing_param == p))
        .map(|l| l.license_id_str.clone())
        .collect();
    free.sort();
    free.into_iter().next()
}

async fn associate_license(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let client_id = resolve_user(&state, &fields)?;
    let user_id = state.users().get(&client_id).map(|u| u.user_id);

    let license_id = match text(&fields, "licenseId").or_else(|| text(&fields, "licenseIdStr")) {
        Some(id) => {
            let license = state
                .licenses()
                .get(&id)
                .ok_or_else(|| Fault::new(LICENSE_NOT_FOUND))?;
            if license.is_assigned() && license.client_user_id_str.as_deref() != Some(client_id.as_str()) {
                return Err(Fault::new(LICENSE_ALREADY_ASSIGNED));
            }
            id
        }
        None => {
            let adam_id = text(&fields, "adamId")
                .or_else(|| text(&fields, "adamIdStr"))
                .ok_or_else(|| Fault::detail(MISSING_ARGUMENT, "licenseId or adamId"))?;
            let pricing = text(&fields, "pricingParam");
            free_license(&state, &adam_id, pricing.as_deref())
                .ok_or_else(|| Fault::detail(LICENSE_NOT_FOUND, "no free license"))?
        }
    };

    let tick = state.tick();
    let license = state.licenses().get_mut(&license_id).map(|mut l| {
        l.client_user_id_str = Some(client_id.clone());
        l.user_id = user_id;
        l.serial_number = None;
        l.modified = tick;
        to_value(l.value())
    });

    let mut out = Map::new();
    out.insert("license".into(), license.unwrap_or(Value::Null));
    out.insert("user".into(), user_json(&state, &client_id));
    success(out)
}

async fn disassociate_license(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let license_id = text(&fields, "licenseId")
        .or_else(|| text(&fields, "licenseIdStr"))
        .ok_or_else(|| Fault::detail(MISSING_ARGUMENT, "licenseId"))?;

    let tick = state.tick();
    let (license, holder) = {
        let mut license = state
            .licenses()
            .get_mut(&license_id)
            .ok_or_else(|| Fault::new(LICENSE_NOT_FOUND))?;
        if !license.is_assigned() {
            return Err(Fault::new(LICENSE_NOT_ASSOCIATED));
        }
        let holder = license.client_user_id_str.clone();
        license.release(tick);
        (to_value(license.value()), holder)
    };

    let mut out = Map::new();
    out.insert("license".into(), license);
    if let Some(client_id) = holder {
        out.insert("user".into(), user_json(&state, &client_id));
    }
    success(out)
}

/// Outcome of one bulk target.
fn association(target_key: &str, target: &str, result: Result<String, Fault>) -> Value {
    let mut entry = Map::new();
    entry.insert(target_key.into(), json!(target));
    match result {
        Ok(license_id) => {
            entry.insert("licenseIdStr".into(), json!(license_id));
        }
        Err(fault) => {
            entry.insert("errorNumber".into(), json!(fault.code));
            entry.insert("errorMessage".into(), json!(fault.message));
        }
    }
    Value::Object(entry)
}

#[derive(Clone, Copy)]
enum Holder<'a> {
    User(&'a str),
    Device(&'a str),
}

fn assign(state: &AppState, adam_id: &str, pricing: &str, holder: Holder<'_>) -> Result<String, Fault> {
    let user_id = match holder {
        Holder::User(client_id) => Some(
            state
                .users()
                .get(client_id)
                .filter(|u| u.status != "Retired")
                .map(|u| u.user_id)
                .ok_or_else(|| Fault::new(USER_NOT_FOUND))?,
        ),
        Holder::Device(_) => None,
    };
    let holds = |l: &SimLicense| match holder {
        Holder::User(id) => l.client_user_id_str.as_deref() == Some(id),
        Holder::Device(serial) => l.serial_number.as_deref() == Some(serial),
    };
    if let Some(existing) = state
        .licenses()
        .iter()
        .find(|l| l.adam_id_str == adam_id && holds(l.value()))
    {
        return Ok(existing.license_id_str.clone());
    }

    let license_id =
        free_license(state, adam_id, Some(pricing)).ok_or_else(|| Fault::detail(LICENSE_NOT_FOUND, "no free license"))?;
    let tick = state.tick();
    if let Some(mut license) = state.licenses().get_mut(&license_id) {
        match holder {
            Holder::User(id) => {
                license.client_user_id_str = Some(id.to_string());
                license.user_id = user_id;
            }
            Holder::Device(serial) => license.serial_number = Some(serial.to_string()),
        }
        license.modified = tick;
    }
    Ok(license_id)
}

fn release(state: &AppState, adam_id: &str, matches: impl Fn(&SimLicense) -> bool) -> Result<String, Fault> {
    let tick = state.tick();
    let mut license = state
        .licenses()
        .iter_mut()
        .find(|l| l.adam_id_str == adam_id && l.is_assigned() && matches(l.value()))
        .ok_or_else(|| Fault::new(LICENSE_NOT_ASSOCIATED))?;
    license.release(tick);
    Ok(license.license_id_str.clone())
}

async fn manage_licenses(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let adam_id = text(&fields, "adamIdStr").ok_or_else(|| Fault::detail(MISSING_ARGUMENT, "adamIdStr"))?;
    let pricing = text(&fields, "pricingParam").unwrap_or_else(|| "STDQ".into());

    let assoc_users = strings(&fields, "associateClientIdStrs");
    let assoc_serials = strings(&fields, "associateSerialNumbers");
    let dis_users = strings(&fields, "disassociateClientIdStrs");
    let dis_serials = strings(&fields, "disassociateSerialNumbers");
    let dis_licenses = strings(&fields, "disassociateLicenseIdStrs");

    if !assoc_users.is_empty() && !assoc_serials.is_empty() {
        return Err(Fault::detail(INVALID_ARGUMENT, "mixed association targets"));
    }
    let dis_kinds = [&dis_users, &dis_serials, &dis_licenses]
        .iter()
        .filter(|v| !v.is_empty())
        .count();
    if dis_kinds > 1 {
        return Err(Fault::detail(INVALID_ARGUMENT, "mixed disassociation targets"));
    }
    if assoc_users.len() + assoc_serials.len() > state.config().max_batch_associate
        || dis_users.len() + dis_serials.len() + dis_licenses.len() > state.config().max_batch_disassociate
    {
        return Err(Fault::detail(INVALID_ARGUMENT, "batch limit exceeded"));
    }

    let mut associations: Vec<Value> = assoc_users
        .iter()
        .map(|id| association("clientUserIdStr", id, assign(&state, &adam_id, &pricing, Holder::User(id))))
        .collect();
    associations.extend(assoc_serials.iter().map(|serial| {
        association(
            "serialNumber",
            serial,
            assign(&state, &adam_id, &pricing, Holder::Device(serial)),
        )
    }));

    let mut disassociations: Vec<Value> = dis_users
        .iter()
        .map(|id| {
            let result = release(&state, &adam_id, |l| l.client_user_id_str.as_deref() == Some(id.as_str()));
            association("clientUserIdStr", id, result)
        })
        .collect();
    disassociations.extend(dis_serials.iter().map(|serial| {
        let result = release(&state, &adam_id, |l| l.serial_number.as_deref() == Some(serial.as_str()));
        association("serialNumber", serial, result)
    }));
    disassociations.extend(dis_licenses.iter().map(|id| {
        let result = release(&state, &adam_id, |l| &l.license_id_str == id);
        association("licenseIdStr", id, result)
    }));

    let product = state.config().assets.iter().find(|a| a.adam_id == adam_id);
    let mut out = Map::new();
    out.insert("adamIdStr".into(), json!(adam_id));
    out.insert("pricingParam".into(), json!(pricing));
    out.insert("productTypeId".into(), json!(product.map(|p| p.product_type_id)));
    out.insert("productTypeName".into(), json!(product.map(|p| p.product_type_name.clone())));
    out.insert("isIrrevocable".into(), json!(false));
    out.insert("associations".into(), Value::Array(associations));
    out.insert("disassociations".into(), Value::Array(disassociations));
    success(out)
}

// ── Assets ──────────────────────────────────────────────────────────

#[derive(Default)]
struct Counts {
    total: u64,
    assigned: u64,
}

async fn get_assets(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    let with_counts = flag(&fields, "includeLicenseCounts");
    let pricing = text(&fields, "pricingParam");

    let mut counts: BTreeMap<String, Counts> = BTreeMap::new();
    for license in state.licenses().iter() {
        let entry = counts.entry(license.adam_id_str.clone()).or_default();
        entry.total += 1;
        if license.is_assigned() {
            entry.assigned += 1;
        }
    }

    let assets: Vec<Value> = state
        .config()
        .assets
        .iter()
        .filter(|a| pricing.as_deref().map_or(true, |p| a.pricing_param == p))
        .map(|asset| {
            let mut out = json!({
                "adamIdStr": asset.adam_id,
                "pricingParam": asset.pricing_param,
                "productTypeId": asset.product_type_id,
                "productTypeName": asset.product_type_name,
                "deviceAssignable": asset.device_assignable,
                "isIrrevocable": false,
            });
            if with_counts {
                let c = counts.get(&asset.adam_id).map_or((0, 0), |c| (c.total, c.assigned));
                out["totalCount"] = json!(c.0);
                out["assignedCount"] = json!(c.1);
                out["availableCount"] = json!(c.0 - c.1);
                out["retiredCount"] = json!(0);
            }
            out
        })
        .collect();

    let mut out = Map::new();
    out.insert("assets".into(), Value::Array(assets));
    success(out)
}

// ── Client context ──────────────────────────────────────────────────

async fn client_config(State(state): State<AppState>, body: Bytes) -> Reply {
    let fields = authenticate(&state, &body)?;
    if let Some(context) = fields.get("clientContext").and_then(Value::as_str) {
        tracing::info!("client context replaced");
        state.set_client_context(context.to_string());
    }

    let mut out = Map::new();
    out.insert(
        "clientContext".into(),
        json!(state.client_context().unwrap_or_default()),
    );
    out.insert("countryCode".into(), json!(state.config().country_code));
    out.insert("email".into(), json!("admin@vpp-sim.invalid"));
    out.insert("appleId".into(), json!("admin@vpp-sim.invalid"));
    out.insert("facilitatorMemberId".into(), json!("SIM-0001"));
    out.insert("locationName".into(), json!("Simulator"));
    success(out)
}
