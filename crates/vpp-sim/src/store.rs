//! In-memory VPP account backed by DashMap.
//!
//! Users are keyed by `clientUserIdStr`, licenses by `licenseIdStr`. Every
//! mutation stamps the record with a tick of a logical clock so that
//! since-modified queries can return only what changed after a token was
//! issued. Pending batches of a paged listing are parked under their batch
//! token until the caller asks for them.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

/// A product seeded into the simulated account.
#[derive(Debug, Clone)]
pub struct SeedAsset {
    pub adam_id: String,
    pub pricing_param: String,
    pub product_type_id: i64,
    pub product_type_name: String,
    pub device_assignable: bool,
    pub license_count: usize,
}

/// Simulator settings.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// The only sToken the simulator accepts.
    pub s_token: String,
    /// Records per page of a paged listing.
    pub page_size: usize,
    pub max_batch_associate: usize,
    pub max_batch_disassociate: usize,
    /// Absolute base for published endpoint URLs. Derived from the `Host`
    /// header when unset.
    pub public_url: Option<String>,
    pub country_code: String,
    pub assets: Vec<SeedAsset>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            s_token: "sim-token".into(),
            page_size: 50,
            max_batch_associate: 100,
            max_batch_disassociate: 100,
            public_url: None,
            country_code: "US".into(),
            assets: vec![
                SeedAsset {
                    adam_id: "408709785".into(),
                    pricing_param: "STDQ".into(),
                    product_type_id: 8,
                    product_type_name: "Software".into(),
                    device_assignable: true,
                    license_count: 10,
                },
                SeedAsset {
                    adam_id: "361309726".into(),
                    pricing_param: "PLUS".into(),
                    product_type_id: 10,
                    product_type_name: "Book".into(),
                    device_assignable: false,
                    license_count: 3,
                },
            ],
        }
    }
}

impl SimConfig {
    /// Read overrides from `VPP_SIM_TOKEN`, `VPP_SIM_PAGE_SIZE` and
    /// `VPP_SIM_PUBLIC_URL`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(token) = std::env::var("VPP_SIM_TOKEN") {
            config.s_token = token;
        }
        if let Some(size) = std::env::var("VPP_SIM_PAGE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n > 0)
        {
            config.page_size = size;
        }
        config.public_url = std::env::var("VPP_SIM_PUBLIC_URL").ok();
        config
    }
}

/// A registered user.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimUser {
    pub user_id: i64,
    pub client_user_id_str: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub status: &'static str,
    pub invite_url: String,
    pub invite_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub its_id_hash: Option<String>,
    #[serde(skip)]
    pub modified: u64,
}

/// One license of a seeded product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimLicense {
    pub license_id_str: String,
    pub adam_id_str: String,
    pub pricing_param: String,
    pub product_type_id: i64,
    pub is_irrevocable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_user_id_str: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    #[serde(skip)]
    pub modified: u64,
}

impl SimLicense {
    pub fn is_assigned(&self) -> bool {
        self.client_user_id_str.is_some() || self.serial_number.is_some()
    }

    pub fn release(&mut self, tick: u64) {
        self.user_id = None;
        self.client_user_id_str = None;
        self.serial_number = None;
        self.modified = tick;
    }
}

/// Most pending batches kept at once. Issuing another evicts the oldest.
pub const MAX_PENDING_BATCHES: usize = 256;

/// Remaining records of a paged listing.
struct PendingBatch {
    items: Vec<Value>,
    horizon: u64,
    issued: u64,
}

struct Inner {
    config: SimConfig,
    users: DashMap<String, SimUser>,
    licenses: DashMap<String, SimLicense>,
    batches: DashMap<String, PendingBatch>,
    batch_seq: AtomicU64,
    client_context: Mutex<Option<String>>,
    clock: AtomicU64,
    next_user_id: AtomicI64,
    overload_remaining: AtomicU32,
    overload_retry_after: AtomicU64,
}

/// Shared application state.
///
/// Cheaply cloneable via `Arc`; all clones share the same account.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

impl AppState {
    pub fn new(config: SimConfig) -> Self {
        let licenses = DashMap::new();
        let mut serial = 0u32;
        for asset in &config.assets {
            for _ in 0..asset.license_count {
                serial += 1;
                let id = format!("L{serial:05}");
                licenses.insert(
                    id.clone(),
                    SimLicense {
                        license_id_str: id,
                        adam_id_str: asset.adam_id.clone(),
                        pricing_param: asset.pricing_param.clone(),
                        product_type_id: asset.product_type_id,
                        is_irrevocable: false,
                        user_id: None,
                        client_user_id_str: None,
                        serial_number: None,
                        modified: 0,
                    },
                );
            }
        }

        Self {
            inner: Arc::new(Inner {
                config,
                users: DashMap::new(),
                licenses,
                batches: DashMap::new(),
                batch_seq: AtomicU64::new(0),
                client_context: Mutex::new(None),
                clock: AtomicU64::new(0),
                next_user_id: AtomicI64::new(1000),
                overload_remaining: AtomicU32::new(0),
                overload_retry_after: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.inner.config
    }

    pub fn users(&self) -> &DashMap<String, SimUser> {
        &self.inner.users
    }

    pub fn licenses(&self) -> &DashMap<String, SimLicense> {
        &self.inner.licenses
    }

    /// Advance the logical clock and return the new tick.
    pub fn tick(&self) -> u64 {
        self.inner.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The current tick without advancing.
    pub fn now(&self) -> u64 {
        self.inner.clock.load(Ordering::SeqCst)
    }

    pub fn next_user_id(&self) -> i64 {
        self.inner.next_user_id.fetch_add(1, Ordering::SeqCst)
    }

    pub fn client_context(&self) -> Option<String> {
        self.inner
            .client_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set_client_context(&self, context: String) {
        let mut guard = self
            .inner
            .client_context
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = Some(context);
    }

    /// Answer the next `count` service requests with `503`.
    pub fn inject_overload(&self, count: u32, retry_after: Duration) {
        self.inner
            .overload_retry_after
            .store(retry_after.as_secs(), Ordering::SeqCst);
        self.inner.overload_remaining.store(count, Ordering::SeqCst);
    }

    /// Consume one injected overload, returning the `Retry-After` seconds.
    pub fn take_overload(&self) -> Option<u64> {
        self.inner
            .overload_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .ok()
            .map(|_| self.inner.overload_retry_after.load(Ordering::SeqCst))
    }

    /// Cut a page off `items`, parking the rest under a fresh batch token.
    ///
    /// The final page carries a since-modified token for `horizon`.
    pub fn paginate(&self, list_key: &str, mut items: Vec<Value>, horizon: u64) -> Map<String, Value> {
        let page_size = self.inner.config.page_size.max(1);
        let rest = if items.len() > page_size {
            items.split_off(page_size)
        } else {
            Vec::new()
        };

        let mut out = Map::new();
        out.insert(list_key.into(), Value::Array(items));
        if rest.is_empty() {
            out.insert("sinceModifiedToken".into(), Value::String(format!("S{horizon}")));
        } else {
            let token = format!("B{}", Uuid::new_v4().simple());
            self.evict_stale_batches();
            let issued = self.inner.batch_seq.fetch_add(1, Ordering::SeqCst);
            self.inner.batches.insert(
                token.clone(),
                PendingBatch {
                    items: rest,
                    horizon,
                    issued,
                },
            );
            out.insert("batchToken".into(), Value::String(token));
        }
        out
    }

    /// Number of listings waiting for their next page.
    pub fn pending_batches(&self) -> usize {
        self.inner.batches.len()
    }

    /// Drop the oldest parked listings until there is room for one more.
    fn evict_stale_batches(&self) {
        while self.inner.batches.len() >= MAX_PENDING_BATCHES {
            let oldest = self
                .inner
                .batches
                .iter()
                .min_by_key(|entry| entry.issued)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(token) => {
                    tracing::debug!(%token, "evicting abandoned batch");
                    self.inner.batches.remove(&token);
                }
                None => break,
            }
        }
    }

    /// Claim the records parked under `token`.
    pub fn take_batch(&self, token: &str) -> Option<(Vec<Value>, u64)> {
        self.inner
            .batches
            .remove(token)
            .map(|(_, batch)| (batch.items, batch.horizon))
    }
}

/// Parse a since-modified token issued by [`AppState::paginate`].
pub fn parse_since_token(token: &str) -> Option<u64> {
    token.strip_prefix('S')?.parse().ok()
}
