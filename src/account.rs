//! Account pairs from the accounts CSV file

use crate::error::{Error, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

/// Two trading identities that take opposite sides of one hedge
#[derive(Clone, PartialEq, Eq)]
pub struct AccountPair {
    pub index: u32,
    pub address_a: Option<String>,
    pub private_key_a: String,
    /// Outbound HTTP proxy for leg A
    pub proxy_a: Option<String>,
    pub address_b: Option<String>,
    pub private_key_b: String,
    pub proxy_b: Option<String>,
}

impl std::fmt::Debug for AccountPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountPair")
            .field("index", &self.index)
            .field("address_a", &self.address_a)
            .field("proxy_a", &self.proxy_a)
            .field("address_b", &self.address_b)
            .field("proxy_b", &self.proxy_b)
            .finish_non_exhaustive()
    }
}

/// Load account pairs from a CSV file
pub fn load_accounts(path: impl AsRef<Path>) -> Result<Vec<AccountPair>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .map_err(|e| Error::Config(format!("open {}: {e}", path.display())))?;
    parse_accounts(file)
}

/// Parse account pairs from CSV text
///
/// Headers are matched case-insensitively. Rows missing either private key
/// are skipped; a missing or unparsable `index` falls back to the 1-based
/// row number.
pub fn parse_accounts<R: Read>(reader: R) -> Result<Vec<AccountPair>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns: HashMap<String, usize> = reader
        .headers()
        .map_err(|e| Error::Config(format!("read accounts header: {e}")))?
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect();

    for required in ["evmprivatekeya", "evmprivatekeyb"] {
        if !columns.contains_key(required) {
            return Err(Error::Config(format!(
                "accounts file is missing column {required}"
            )));
        }
    }

    let mut accounts = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| Error::Config(format!("read accounts row: {e}")))?;
        let field = |name: &str| {
            columns
                .get(name)
                .and_then(|&i| record.get(i))
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let (Some(private_key_a), Some(private_key_b)) =
            (field("evmprivatekeya"), field("evmprivatekeyb"))
        else {
            tracing::debug!(row = row + 1, "Skipping account row without both keys");
            continue;
        };

        let index = field("index")
            .and_then(|v| v.parse().ok())
            .unwrap_or(row as u32 + 1);

        accounts.push(AccountPair {
            index,
            address_a: field("evmaddressa"),
            private_key_a,
            proxy_a: field("proxyaddressa"),
            address_b: field("evmaddressb"),
            private_key_b,
            proxy_b: field("proxyaddressb"),
        });
    }

    if accounts.is_empty() {
        return Err(Error::Config("accounts file has no usable rows".into()));
    }
    Ok(accounts)
}
