//! Per-user context derived from the last 30 days of trades and current holdings.

use super::signals::round2;
use crate::models::{Personalization, TradeSide, UserHolding, UserTrade};
use std::collections::HashMap;

pub const ACTIVE_TRADING: &str = "active-trading-style";
pub const LIGHT_TRADING: &str = "light-trading-activity";
pub const CONCENTRATED: &str = "portfolio-concentration";
pub const DE_RISKING: &str = "recent-de-risking";

/// Personalization plus the additive risk-score adjustment it implies.
#[derive(Debug, Clone, PartialEq)]
pub struct UserContext {
    pub personalization: Personalization,
    pub adjustment: f64,
}

/// `None` when the user has neither recent trades nor holdings.
pub fn build_context(
    user_id: &str,
    trades: &[UserTrade],
    holdings: &[UserHolding],
) -> Option<UserContext> {
    let trade_count = trades.len();
    if trade_count == 0 && holdings.is_empty() {
        return None;
    }

    let buys = trades.iter().filter(|t| t.side == TradeSide::Buy).count();
    let sells = trades.iter().filter(|t| t.side == TradeSide::Sell).count();
    let buy_ratio = (trade_count > 0).then(|| round2(buys as f64 / trade_count as f64));
    let top_traded_asset = most_common(trades.iter().map(|t| t.asset.as_str()));

    let total_qty: f64 = holdings.iter().map(|h| h.quantity.abs()).sum();
    let top_holding = holdings
        .iter()
        .fold(None::<&UserHolding>, |best, h| match best {
            Some(b) if b.quantity.abs() >= h.quantity.abs() => Some(b),
            _ => Some(h),
        });
    let top_holding_asset = top_holding.map(|h| h.asset.clone());
    let top_holding_share = match top_holding {
        Some(h) if total_qty > 0.0 => Some(round2(h.quantity.abs() / total_qty)),
        _ => None,
    };

    let mut notes = Vec::new();
    let mut adjustment = 0.0;
    if trade_count >= 10 {
        notes.push(ACTIVE_TRADING.to_string());
        adjustment += 0.03;
    } else if trade_count <= 2 {
        notes.push(LIGHT_TRADING.to_string());
        adjustment -= 0.02;
    }
    if top_holding_share.is_some_and(|share| share >= 0.6) {
        notes.push(CONCENTRATED.to_string());
        adjustment -= 0.05;
    }
    if trade_count > 0 && sells as f64 / trade_count as f64 >= 0.6 {
        notes.push(DE_RISKING.to_string());
        adjustment -= 0.03;
    }

    let activity = match trade_count {
        n if n >= 10 => "active",
        n if n >= 3 => "moderate",
        _ => "light",
    };

    let mut parts = Vec::new();
    if trade_count > 0 {
        parts.push(format!("30d trades={}", trade_count));
    }
    if let Some(ratio) = buy_ratio {
        parts.push(format!("buy ratio={:.2}", ratio));
    }
    if let Some(asset) = &top_traded_asset {
        parts.push(format!("top traded={}", asset));
    }
    if let (Some(asset), Some(share)) = (&top_holding_asset, top_holding_share) {
        parts.push(format!("top holding={} {:.0}%", asset, share * 100.0));
    }
    let summary = (!parts.is_empty()).then(|| parts.join(", "));

    Some(UserContext {
        personalization: Personalization {
            user_id: user_id.to_string(),
            trade_count_30d: trade_count,
            buy_ratio,
            top_traded_asset,
            holdings_count: holdings.len(),
            top_holding_asset,
            top_holding_share,
            notes,
            activity: activity.to_string(),
            summary,
        },
        adjustment,
    })
}

/// Most frequent item; ties go to the first seen.
fn most_common<'a>(items: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();
    for item in items {
        let n = counts.entry(item).or_insert(0);
        if *n == 0 {
            order.push(item);
        }
        *n += 1;
    }

    let mut best: Option<(&str, usize)> = None;
    for item in order {
        let n = counts.get(item).copied().unwrap_or(0);
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((item, n));
        }
    }
    best.map(|(item, _)| item.to_string())
}
