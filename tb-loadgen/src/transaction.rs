use serde::{Deserialize, Serialize};

/// One movement of whole units from `from` to `to`, as produced by the generator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub from: u128,
    pub to: u128,
    pub amount: u64,
}

/// A transfer record in the ledger's own shape. The debit side is the paying account.
///
/// In JSON the 128-bit fields are encoded as decimal strings, `ledger` and `code` as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Transfer {
    #[serde(with = "decimal_string")]
    pub id: u128,
    #[serde(with = "decimal_string")]
    pub debit_account_id: u128,
    #[serde(with = "decimal_string")]
    pub credit_account_id: u128,
    #[serde(with = "decimal_string")]
    pub amount: u128,
    pub ledger: u32,
    pub code: u16,
}

impl Transaction {
    #[must_use]
    pub fn new(from: u128, to: u128, amount: u64) -> Self {
        Transaction { from, to, amount }
    }

    #[must_use]
    pub fn to_transfer(&self, id: u128, ledger: u32, code: u16) -> Transfer {
        Transfer {
            id,
            debit_account_id: self.from,
            credit_account_id: self.to,
            amount: u128::from(self.amount),
            ledger,
            code,
        }
    }
}

/// Numbers the transactions in order, starting at 1
#[must_use]
pub fn to_transfers(transactions: &[Transaction], ledger: u32, code: u16) -> Vec<Transfer> {
    transactions
        .iter()
        .zip(1_u128..)
        .map(|(tx, id)| tx.to_transfer(id, ledger, code))
        .collect()
}

mod decimal_string {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &u128, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u128, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse()
            .map_err(|_| de::Error::custom(format!("invalid decimal integer: {s}")))
    }
}
