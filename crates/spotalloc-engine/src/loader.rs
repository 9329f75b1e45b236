//! JSON ingestion of break and brand records.
//!
//! Each document is either an array of records or an object keyed by the
//! decimal record index (`"0"`, `"1"`, ...). Break records carry a slot
//! price table and a reach table keyed by audience segment; the reach
//! matrix is built by joining every brand's audience against every break's
//! table, and a missing segment is rejected here rather than left unset.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, info};

use crate::instance::{Brand, CommercialBreak, DataError, Instance};

pub const DEFAULT_PRICE_SLOT: &str = "normal_1";

#[derive(Debug, Deserialize)]
struct RawBreak {
    remaining_time: f64,
    prime: PrimeIndicator,
    #[serde(default)]
    slots: BTreeMap<String, RawSlot>,
    grp: BTreeMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct RawSlot {
    price: i64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrimeIndicator {
    Flag(bool),
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct RawBrand {
    #[serde(rename = "type")]
    kind: String,
    audience: String,
    format: f64,
    cost_grp: f64,
    budget: f64,
    ratio_prime: f64,
}

impl PrimeIndicator {
    fn to_flag(&self) -> Option<bool> {
        match self {
            PrimeIndicator::Flag(b) => Some(*b),
            PrimeIndicator::Number(n) => Some(*n != 0),
            PrimeIndicator::Text(s) => {
                let s = s.trim();
                match s.parse::<i64>() {
                    Ok(n) => Some(n != 0),
                    Err(_) => match s.to_ascii_lowercase().as_str() {
                        "true" => Some(true),
                        "false" => Some(false),
                        _ => None,
                    },
                }
            }
        }
    }

    fn describe(&self) -> String {
        match self {
            PrimeIndicator::Flag(b) => b.to_string(),
            PrimeIndicator::Number(n) => n.to_string(),
            PrimeIndicator::Text(s) => s.clone(),
        }
    }
}

/// Builds an [`Instance`] from break and brand JSON documents
#[derive(Debug, Clone)]
pub struct InstanceLoader {
    price_slot: String,
}

impl Default for InstanceLoader {
    fn default() -> Self {
        Self {
            price_slot: DEFAULT_PRICE_SLOT.to_string(),
        }
    }
}

impl InstanceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot whose price is charged for a placement
    pub fn with_price_slot(mut self, slot: impl Into<String>) -> Self {
        self.price_slot = slot.into();
        self
    }

    pub fn load_files(&self, breaks: impl AsRef<Path>, brands: impl AsRef<Path>) -> Result<Instance, DataError> {
        let breaks = read_json(breaks.as_ref(), "breaks")?;
        let brands = read_json(brands.as_ref(), "brands")?;
        self.from_values(breaks, brands)
    }

    pub fn from_json_str(&self, breaks: &str, brands: &str) -> Result<Instance, DataError> {
        let breaks = serde_json::from_str(breaks).map_err(|source| DataError::Json { what: "breaks", source })?;
        let brands = serde_json::from_str(brands).map_err(|source| DataError::Json { what: "brands", source })?;
        self.from_values(breaks, brands)
    }

    pub fn from_values(&self, breaks: Value, brands: Value) -> Result<Instance, DataError> {
        let raw_breaks: Vec<RawBreak> = dense_records(breaks, "break")?;
        let raw_brands: Vec<RawBrand> = dense_records(brands, "brand")?;

        let brands: Vec<Brand> = raw_brands
            .into_iter()
            .enumerate()
            .map(|(id, raw)| Brand {
                id,
                kind: raw.kind,
                audience: raw.audience,
                format_time: raw.format,
                grp_cap: raw.cost_grp,
                budget_cap: raw.budget,
                prime_ratio: raw.ratio_prime,
            })
            .collect();

        let mut breaks = Vec::with_capacity(raw_breaks.len());
        let mut cost = Vec::with_capacity(raw_breaks.len());
        let mut grp = Vec::with_capacity(raw_breaks.len());

        for (id, raw) in raw_breaks.iter().enumerate() {
            let prime = raw.prime.to_flag().ok_or_else(|| DataError::InvalidPrime {
                break_id: id,
                value: raw.prime.describe(),
            })?;
            let price = raw
                .slots
                .get(&self.price_slot)
                .map(|slot| slot.price)
                .ok_or_else(|| DataError::MissingPriceSlot {
                    break_id: id,
                    slot: self.price_slot.clone(),
                })?;

            let reach = brands
                .iter()
                .map(|brand| {
                    raw.grp.get(&brand.audience).copied().ok_or_else(|| DataError::UnresolvedReach {
                        break_id: id,
                        brand_id: brand.id,
                        audience: brand.audience.clone(),
                    })
                })
                .collect::<Result<Vec<f64>, DataError>>()?;

            breaks.push(CommercialBreak::new(id, raw.remaining_time, prime));
            cost.push(vec![price; brands.len()]);
            grp.push(reach);
        }

        let instance = Instance::new(breaks, brands, cost, grp)?;
        info!(
            breaks = instance.num_breaks(),
            brands = instance.num_brands(),
            slot = %self.price_slot,
            "loaded instance"
        );
        Ok(instance)
    }
}

fn read_json(path: &Path, what: &'static str) -> Result<Value, DataError> {
    debug!(path = %path.display(), what, "reading input");
    let text = std::fs::read_to_string(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DataError::Json { what, source })
}

/// Records in index order, from an array or an index-keyed object
fn dense_records<T: DeserializeOwned>(value: Value, what: &'static str) -> Result<Vec<T>, DataError> {
    let parse = |item: Value, index: String| {
        serde_json::from_value(item).map_err(|source| DataError::Record { what, index, source })
    };

    match value {
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| parse(item, i.to_string()))
            .collect(),
        Value::Object(map) => {
            let mut indexed = Vec::with_capacity(map.len());
            for (key, item) in map {
                let index: usize = key.trim().parse().map_err(|_| DataError::InvalidIndex {
                    what,
                    key: key.clone(),
                })?;
                indexed.push((index, key, item));
            }
            indexed.sort_by_key(|(index, _, _)| *index);

            let last = indexed.len().saturating_sub(1);
            for (position, (index, _, _)) in indexed.iter().enumerate() {
                if *index != position {
                    return Err(DataError::MissingIndex {
                        what,
                        last,
                        missing: position,
                    });
                }
            }

            indexed.into_iter().map(|(_, key, item)| parse(item, key)).collect()
        }
        _ => Err(DataError::NotACollection(what)),
    }
}
