//! Balance reconciliation.
//!
//! [`reconcile`] is a pure fold: the caller reads the group's rows (ordered)
//! and hands them over, so the same rows always produce the same balances.
//!
//! Sign convention: a positive net means the user owes the group, a negative
//! net means the group owes the user.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::{LedgerError, MoneyCents, ResultLedger};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExpenseRow {
    pub expense_id: i64,
    pub paid_by: Option<i64>,
    pub amount: MoneyCents,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShareRow {
    pub expense_id: i64,
    pub user_id: i64,
    pub amount_owed: MoneyCents,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SettlementRow {
    pub payer_id: Option<i64>,
    pub payee_id: Option<i64>,
    pub amount: MoneyCents,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub user_id: i64,
    pub net: MoneyCents,
}

/// Net balances of a group, ordered by user id.
///
/// `unattributed` collects the legs whose user reference was cleared, so
/// `total() + unattributed` is always zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupBalances {
    pub group_id: i64,
    pub balances: Vec<Balance>,
    pub unattributed: MoneyCents,
}

impl GroupBalances {
    pub fn total(&self) -> MoneyCents {
        self.balances.iter().map(|b| b.net).sum()
    }

    pub fn get(&self, user_id: i64) -> Option<MoneyCents> {
        self.balances
            .iter()
            .find(|b| b.user_id == user_id)
            .map(|b| b.net)
    }
}

struct Fold {
    nets: BTreeMap<i64, MoneyCents>,
    unattributed: MoneyCents,
}

impl Fold {
    fn post(&mut self, user_id: Option<i64>, delta: MoneyCents) -> ResultLedger<()> {
        let slot = match user_id {
            Some(id) => self.nets.entry(id).or_insert(MoneyCents::ZERO),
            None => &mut self.unattributed,
        };
        *slot = slot
            .checked_add(delta)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
        Ok(())
    }

    fn touch(&mut self, user_id: Option<i64>) {
        if let Some(id) = user_id {
            self.nets.entry(id).or_insert(MoneyCents::ZERO);
        }
    }
}

fn negate(amount: MoneyCents) -> ResultLedger<MoneyCents> {
    amount
        .cents()
        .checked_neg()
        .map(MoneyCents::new)
        .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))
}

/// Folds a group's expenses, shares and settlements into net balances.
///
/// Each share is owed by its user. Each expense credits its payer with the
/// full amount and charges back the unallocated remainder, so an expense
/// always nets to zero on its own. A settlement moves `amount` from the
/// payer's debt to the payee's.
pub fn reconcile(
    group_id: i64,
    expenses: &[ExpenseRow],
    shares: &[ShareRow],
    settlements: &[SettlementRow],
) -> ResultLedger<GroupBalances> {
    let mut fold = Fold {
        nets: BTreeMap::new(),
        unattributed: MoneyCents::ZERO,
    };

    let mut allocated: HashMap<i64, MoneyCents> = expenses
        .iter()
        .map(|e| (e.expense_id, MoneyCents::ZERO))
        .collect();

    for share in shares {
        let sum = allocated.get_mut(&share.expense_id).ok_or_else(|| {
            LedgerError::InvalidState(format!(
                "share references expense {} outside group {group_id}",
                share.expense_id
            ))
        })?;
        *sum = sum
            .checked_add(share.amount_owed)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
        fold.post(Some(share.user_id), share.amount_owed)?;
    }

    for expense in expenses {
        let shared = allocated
            .get(&expense.expense_id)
            .copied()
            .unwrap_or(MoneyCents::ZERO);
        let remainder = expense
            .amount
            .checked_sub(shared)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
        // Credit amount, charge back the remainder: net credit equals `shared`.
        fold.touch(expense.paid_by);
        fold.post(expense.paid_by, negate(expense.amount)?)?;
        fold.post(expense.paid_by, remainder)?;
    }

    for settlement in settlements {
        fold.post(settlement.payer_id, negate(settlement.amount)?)?;
        fold.post(settlement.payee_id, settlement.amount)?;
    }

    let balances = fold
        .nets
        .into_iter()
        .map(|(user_id, net)| Balance { user_id, net })
        .collect();

    Ok(GroupBalances {
        group_id,
        balances,
        unattributed: fold.unattributed,
    })
}
