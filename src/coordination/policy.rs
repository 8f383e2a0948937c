//! Threshold policy: which accounts must sign, and how much weight they need.

use std::collections::BTreeMap;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};

use crate::ledger::{AccountId, OperationBody, Thresholds, Transaction};

/// Authorization level an operation demands from its responsible account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationCategory {
    /// Trustline authorization by an issuer; needs no threshold weight.
    NoThreshold,
    Low,
    /// Changes to signers or thresholds.
    High,
}

impl OperationCategory {
    /// Category of an operation body.
    pub fn of(body: &OperationBody) -> Self {
        match body {
            OperationBody::AllowTrust { .. } => Self::NoThreshold,
            OperationBody::SetOptions(options) if options.changes_authorization() => Self::High,
            _ => Self::Low,
        }
    }
}

/// Which categories an account's operations fall into.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySet {
    pub no_threshold: bool,
    pub low: bool,
    pub high: bool,
}

impl CategorySet {
    pub fn contains(self, category: OperationCategory) -> bool {
        match category {
            OperationCategory::NoThreshold => self.no_threshold,
            OperationCategory::Low => self.low,
            OperationCategory::High => self.high,
        }
    }
}

impl From<OperationCategory> for CategorySet {
    fn from(category: OperationCategory) -> Self {
        let mut set = Self::default();
        match category {
            OperationCategory::NoThreshold => set.no_threshold = true,
            OperationCategory::Low => set.low = true,
            OperationCategory::High => set.high = true,
        }
        set
    }
}

impl BitOr for CategorySet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            no_threshold: self.no_threshold || rhs.no_threshold,
            low: self.low || rhs.low,
            high: self.high || rhs.high,
        }
    }
}

impl BitOrAssign for CategorySet {
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

/// Category of a single operation.
pub fn categorize(body: &OperationBody) -> OperationCategory {
    OperationCategory::of(body)
}

/// Categories per responsible account, merged across all operations.
///
/// Ordered by account so that every derived structure is deterministic.
pub fn source_categories(tx: &Transaction) -> BTreeMap<AccountId, CategorySet> {
    let mut categories: BTreeMap<AccountId, CategorySet> = BTreeMap::new();
    for op in &tx.operations {
        let account = tx.responsible_account(op);
        *categories.entry(account).or_default() |= CategorySet::from(categorize(&op.body));
    }
    categories
}

/// Weight an account must collect for the given categories.
///
/// `LOW` operations are held to the medium threshold and `HIGH` operations to
/// the high threshold; `NO_THRESHOLD` contributes nothing. The result is never
/// below 1.
pub fn required_threshold(categories: CategorySet, thresholds: &Thresholds) -> u32 {
    let low = if categories.low { thresholds.medium } else { 0 };
    let high = if categories.high { thresholds.high } else { 0 };
    low.max(high).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Asset, Keypair, Operation, SetOptions, SignerSpec};

    fn account(seed: u8) -> AccountId {
        Keypair::from_seed([seed; 32]).account_id()
    }

    fn tx(source: AccountId, operations: Vec<Operation>) -> Transaction {
        Transaction {
            source_account: source,
            fee: 100,
            sequence: 1,
            memo: None,
            operations,
        }
    }

    fn allow_trust(trustor: AccountId) -> Operation {
        Operation::new(OperationBody::AllowTrust {
            trustor,
            asset_code: "TEST".to_string(),
            authorize: true,
        })
    }

    const THRESHOLDS: Thresholds = Thresholds {
        low: 1,
        medium: 10,
        high: 20,
    };

    #[test]
    fn test_categorize() {
        assert_eq!(
            categorize(&allow_trust(account(2)).body),
            OperationCategory::NoThreshold
        );
        assert_eq!(
            categorize(&OperationBody::ManageData {
                name: "k".to_string(),
                value: None
            }),
            OperationCategory::Low
        );
        assert_eq!(
            categorize(&OperationBody::SetOptions(SetOptions {
                home_domain: Some("example.com".to_string()),
                ..SetOptions::default()
            })),
            OperationCategory::Low
        );
        assert_eq!(
            categorize(&OperationBody::SetOptions(SetOptions {
                signer: Some(SignerSpec {
                    key: account(3),
                    weight: 1
                }),
                ..SetOptions::default()
            })),
            OperationCategory::High
        );
    }

    #[test]
    fn test_no_threshold_only_requires_weight_one() {
        let issuer = account(1);
        let tx = tx(issuer, vec![allow_trust(account(2)), allow_trust(account(3))]);

        let categories = source_categories(&tx);
        assert_eq!(categories.len(), 1);
        let set = categories[&issuer];
        assert!(set.no_threshold && !set.low && !set.high);
        assert_eq!(required_threshold(set, &THRESHOLDS), 1);
    }

    #[test]
    fn test_flags_merge_per_responsible_account() {
        let issuer = account(1);
        let holder = account(2);
        let tx = tx(
            issuer,
            vec![
                Operation::new(OperationBody::ChangeTrust {
                    asset: Asset::Credit {
                        code: "TEST".to_string(),
                        issuer,
                    },
                    limit: None,
                })
                .with_source(holder),
                allow_trust(holder),
                Operation::new(OperationBody::SetOptions(SetOptions {
                    high_threshold: Some(30),
                    ..SetOptions::default()
                })),
            ],
        );

        let categories = source_categories(&tx);
        assert_eq!(categories[&holder], CategorySet::from(OperationCategory::Low));
        let issuer_set = categories[&issuer];
        assert!(issuer_set.contains(OperationCategory::NoThreshold));
        assert!(issuer_set.contains(OperationCategory::High));
        assert!(!issuer_set.contains(OperationCategory::Low));

        assert_eq!(required_threshold(categories[&holder], &THRESHOLDS), 10);
        assert_eq!(required_threshold(issuer_set, &THRESHOLDS), 20);
    }

    #[test]
    fn test_zero_thresholds_floor_at_one() {
        let set =
            CategorySet::from(OperationCategory::Low) | CategorySet::from(OperationCategory::High);
        assert_eq!(required_threshold(set, &Thresholds::default()), 1);
    }
}
