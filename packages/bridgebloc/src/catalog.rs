//! Route and token catalog
//!
//! Read-only chain metadata (native chain id, bridge domain, icon), token list
//! and the route table published by the backend.
//!
//! ## Catalog file format
//!
//! ```json
//! {
//!   "chains": {
//!     "ethereum": { "chain_id": 1, "domain": 0, "image_url": "https://..." }
//!   },
//!   "tokens": [
//!     { "chain_name": "ethereum", "symbol": "USDC", "address": "0x...", "decimals": 6 }
//!   ],
//!   "routes": { "ethereum": { "arbitrum": "cctp" } }
//! }
//! ```

use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::backend::RouteTable;

/// A source chain that has at least one route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteSummary {
    pub chain: String,
    pub icon_url: String,
}

/// A destination reachable from some source chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChainRoute {
    pub chain: String,
    /// Bridging mechanism name (e.g. "cctp")
    pub route: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainMetadata {
    /// Native EVM chain id
    pub chain_id: u64,
    /// Numeric bridge domain used as deposit routing
    #[serde(default)]
    pub domain: Option<u32>,
    #[serde(default)]
    pub image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub chain_name: String,
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub decimals: Option<u8>,
}

pub trait Catalog: Send + Sync {
    fn list_routes(&self) -> Vec<RouteSummary>;
    fn list_chain_routes(&self, chain: &str) -> Vec<ChainRoute>;
    fn tokens_for_chain(&self, chain: &str) -> Vec<Token>;
    fn domain_for_chain(&self, chain: &str) -> Option<u32>;
    /// Native chain id for a chain name
    fn chain_id_for(&self, chain: &str) -> Option<u64>;
}

/// Catalog loaded from JSON, with routes optionally refreshed from the backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticCatalog {
    #[serde(default)]
    pub chains: BTreeMap<String, ChainMetadata>,
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub routes: RouteTable,
}

impl StaticCatalog {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).wrap_err("Malformed catalog")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read catalog {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Replace the route table (typically with the backend's)
    pub fn with_routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    fn icon_for(&self, chain: &str) -> String {
        self.chains
            .get(chain)
            .map(|c| c.image_url.clone())
            .unwrap_or_default()
    }

    /// Look up a token on `chain` by symbol (case-insensitive) or address
    pub fn find_token(&self, chain: &str, symbol_or_address: &str) -> Option<Token> {
        self.tokens
            .iter()
            .filter(|t| t.chain_name == chain)
            .find(|t| {
                t.symbol.eq_ignore_ascii_case(symbol_or_address)
                    || t.address.eq_ignore_ascii_case(symbol_or_address)
            })
            .cloned()
    }
}

impl Catalog for StaticCatalog {
    fn list_routes(&self) -> Vec<RouteSummary> {
        self.routes
            .keys()
            .map(|chain| RouteSummary {
                chain: chain.clone(),
                icon_url: self.icon_for(chain),
            })
            .collect()
    }

    fn list_chain_routes(&self, chain: &str) -> Vec<ChainRoute> {
        self.routes
            .get(chain)
            .map(|destinations| {
                destinations
                    .iter()
                    .map(|(dest, route)| ChainRoute {
                        chain: dest.clone(),
                        route: route.clone(),
                        icon_url: self.icon_for(dest),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn tokens_for_chain(&self, chain: &str) -> Vec<Token> {
        self.tokens
            .iter()
            .filter(|t| t.chain_name == chain)
            .cloned()
            .collect()
    }

    fn domain_for_chain(&self, chain: &str) -> Option<u32> {
        self.chains.get(chain).and_then(|c| c.domain)
    }

    fn chain_id_for(&self, chain: &str) -> Option<u64> {
        self.chains.get(chain).map(|c| c.chain_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "chains": {
            "ethereum": { "chain_id": 1, "domain": 0, "image_url": "eth.svg" },
            "arbitrum": { "chain_id": 42161, "domain": 3, "image_url": "arb.svg" },
            "polygon-zkevm": { "chain_id": 1101 }
        },
        "tokens": [
            { "chain_name": "ethereum", "symbol": "USDC", "address": "0xA0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48", "decimals": 6 },
            { "chain_name": "arbitrum", "symbol": "USDC", "address": "0xaf88d065e77c8cC2239327C5EDb3A432268e5831", "decimals": 6 },
            { "chain_name": "ethereum", "symbol": "MYST", "address": "0x0000000000000000000000000000000000000009" }
        ],
        "routes": {
            "ethereum": { "arbitrum": "cctp", "polygon-zkevm": "lxly" }
        }
    }"#;

    #[test]
    fn test_list_routes() {
        let catalog = StaticCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(
            catalog.list_routes(),
            vec![RouteSummary {
                chain: "ethereum".into(),
                icon_url: "eth.svg".into()
            }]
        );
    }

    #[test]
    fn test_list_chain_routes() {
        let catalog = StaticCatalog::from_json_str(CATALOG).unwrap();
        let routes = catalog.list_chain_routes("ethereum");
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0].chain, "arbitrum");
        assert_eq!(routes[0].route, "cctp");
        assert_eq!(routes[0].icon_url, "arb.svg");
        assert_eq!(routes[1].icon_url, "");
        assert!(catalog.list_chain_routes("arbitrum").is_empty());
    }

    #[test]
    fn test_tokens_and_lookup() {
        let catalog = StaticCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.tokens_for_chain("ethereum").len(), 2);
        let usdc = catalog.find_token("ethereum", "usdc").unwrap();
        assert_eq!(usdc.decimals, Some(6));
        let by_addr = catalog
            .find_token("arbitrum", "0xAF88D065E77C8CC2239327C5EDB3A432268E5831")
            .unwrap();
        assert_eq!(by_addr.symbol, "USDC");
        assert_eq!(catalog.find_token("ethereum", "MYST").unwrap().decimals, None);
        assert!(catalog.find_token("base", "USDC").is_none());
    }

    #[test]
    fn test_domain_and_chain_id() {
        let catalog = StaticCatalog::from_json_str(CATALOG).unwrap();
        assert_eq!(catalog.domain_for_chain("ethereum"), Some(0));
        assert_eq!(catalog.domain_for_chain("arbitrum"), Some(3));
        assert_eq!(catalog.domain_for_chain("polygon-zkevm"), None);
        assert_eq!(catalog.chain_id_for("arbitrum"), Some(42161));
        assert_eq!(catalog.chain_id_for("solana"), None);
    }

    #[test]
    fn test_with_routes_replaces_table() {
        let mut routes = RouteTable::new();
        routes.insert(
            "arbitrum".into(),
            BTreeMap::from([("ethereum".to_string(), "cctp".to_string())]),
        );
        let catalog = StaticCatalog::from_json_str(CATALOG).unwrap().with_routes(routes);
        assert_eq!(catalog.list_routes()[0].chain, "arbitrum");
        assert!(catalog.list_chain_routes("ethereum").is_empty());
    }

    #[test]
    fn test_bundled_catalog() {
        let catalog = StaticCatalog::from_json_str(include_str!("../catalog.json")).unwrap();
        for chain in catalog.list_routes() {
            assert!(catalog.chain_id_for(&chain.chain).is_some(), "{}", chain.chain);
            assert!(catalog.domain_for_chain(&chain.chain).is_some(), "{}", chain.chain);
            for route in catalog.list_chain_routes(&chain.chain) {
                assert!(catalog.domain_for_chain(&route.chain).is_some(), "{}", route.chain);
            }
            let usdc = catalog.find_token(&chain.chain, "USDC").unwrap();
            assert_eq!(usdc.decimals, Some(6));
        }
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(StaticCatalog::from_json_str("{ \"chains\": 3 }").is_err());
    }
}
