//! # Receipt
//!
//! Read-only projection of a cart at the moment of checkout, plus two pure
//! renderers. Nothing here touches a printer; the billing crate hands the
//! rendered document to whichever `ReceiptPrinter` is configured.
//!
//! ```text
//!         Cart ──► Receipt::from_cart ──► Receipt ──┬──► render_text(width)
//!                                                   └──► render_html()
//! ```
//!
//! A 32 column text rendering looks like:
//! ```text
//!          Corner Grocery
//!         2024-01-15 10:30
//! --------------------------------
//! Whole Milk 1L
//!   2 x Rs 0.50            Rs 1.00
//! Brown Bread
//!   1 x Rs 0.30            Rs 0.30
//! --------------------------------
//! SUBTOTAL                 Rs 1.30
//! Items: 3
//!
//!            Thank you!
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::cart::Cart;
use crate::money::Money;
use crate::types::Shop;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ReceiptLine {
    pub name: String,
    pub code: Option<String>,
    pub quantity: i64,
    pub unit_price: Money,
    pub line_total: Money,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Receipt {
    pub shop_id: String,
    pub shop_name: String,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    pub lines: Vec<ReceiptLine>,
    pub subtotal: Money,
}

impl Receipt {
    /// Snapshots the cart. The subtotal is the cart's own subtotal.
    pub fn from_cart(cart: &Cart, shop: &Shop, issued_at: DateTime<Utc>) -> Self {
        let lines = cart
            .lines()
            .iter()
            .map(|l| ReceiptLine {
                name: l.name.clone(),
                code: l.code.clone(),
                quantity: l.quantity,
                unit_price: l.unit_price,
                line_total: l.line_total(),
            })
            .collect();

        Receipt {
            shop_id: shop.id.clone(),
            shop_name: shop.name.clone(),
            issued_at,
            lines,
            subtotal: cart.subtotal(),
        }
    }

    pub fn item_count(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Plain text for a thermal printer `width` columns wide.
    pub fn render_text(&self, width: usize, currency: &str) -> String {
        let rule = "-".repeat(width);
        let mut out = Vec::new();

        out.push(center(&self.shop_name, width));
        out.push(center(&self.issued_at.format(TIMESTAMP_FORMAT).to_string(), width));
        out.push(rule.clone());

        for line in &self.lines {
            out.push(truncate(&line.name, width));
            let left = format!("  {} x {}", line.quantity, line.unit_price.format_with(currency));
            out.push(two_columns(&left, &line.line_total.format_with(currency), width));
        }

        out.push(rule);
        out.push(two_columns("SUBTOTAL", &self.subtotal.format_with(currency), width));
        out.push(format!("Items: {}", self.item_count()));
        out.push(String::new());
        out.push(center("Thank you!", width));

        let mut text = out
            .into_iter()
            .map(|l| l.trim_end().to_string())
            .collect::<Vec<_>>()
            .join("\n");
        text.push('\n');
        text
    }

    /// Self-contained printable HTML page that prints itself when opened.
    pub fn render_html(&self, currency: &str) -> String {
        let rows: String = self
            .lines
            .iter()
            .map(|l| {
                format!(
                    "      <tr><td>{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td><td class=\"num\">{}</td></tr>\n",
                    escape_html(&l.name),
                    l.quantity,
                    escape_html(&l.unit_price.format_with(currency)),
                    escape_html(&l.line_total.format_with(currency)),
                )
            })
            .collect();

        format!(
            r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Receipt - {shop}</title>
  <style>
    body {{ font-family: monospace; max-width: 320px; margin: 0 auto; }}
    h1 {{ font-size: 1.2em; text-align: center; margin-bottom: 0; }}
    .meta {{ text-align: center; margin-top: 4px; }}
    table {{ width: 100%; border-collapse: collapse; }}
    th, td {{ padding: 2px 0; text-align: left; }}
    .num {{ text-align: right; }}
    tfoot td {{ border-top: 1px dashed #000; font-weight: bold; }}
  </style>
</head>
<body>
  <h1>{shop}</h1>
  <p class="meta">{issued}</p>
  <table>
    <thead>
      <tr><th>Item</th><th class="num">Qty</th><th class="num">Price</th><th class="num">Total</th></tr>
    </thead>
    <tbody>
{rows}    </tbody>
    <tfoot>
      <tr><td colspan="3">Subtotal</td><td class="num">{subtotal}</td></tr>
    </tfoot>
  </table>
  <p class="meta">Thank you!</p>
  <script>window.onload = function () {{ window.print(); }};</script>
</body>
</html>
"#,
            shop = escape_html(&self.shop_name),
            issued = self.issued_at.format(TIMESTAMP_FORMAT),
            rows = rows,
            subtotal = escape_html(&self.subtotal.format_with(currency)),
        )
    }
}

// =============================================================================
// Layout Helpers
// =============================================================================

fn truncate(s: &str, width: usize) -> String {
    s.chars().take(width).collect()
}

fn center(s: &str, width: usize) -> String {
    let s = truncate(s, width);
    let pad = width.saturating_sub(s.chars().count()) / 2;
    format!("{}{}", " ".repeat(pad), s)
}

/// `left` flush left, `right` flush right; `left` gives way when both don't fit.
fn two_columns(left: &str, right: &str, width: usize) -> String {
    let right_len = right.chars().count();
    let room = width.saturating_sub(right_len + 1);
    let left = truncate(left, room);
    let gap = width.saturating_sub(left.chars().count() + right_len).max(1);
    format!("{}{}{}", left, " ".repeat(gap), right)
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
