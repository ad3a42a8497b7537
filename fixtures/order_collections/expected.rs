// Code generated by tagconv. DO NOT EDIT.

use anyhow::anyhow;
use crate::orders::Order;
use crate::orders::OrderRow;

/// Converts `Order` into `OrderRow`.
pub fn order_to_order_row(from: &Order) -> anyhow::Result<OrderRow> {
    let mut to = OrderRow::default();
    let mut items = Vec::with_capacity(from.Items.len());
    for (index, item) in from.Items.iter().enumerate() {
        let item = item.clone().ok_or_else(|| anyhow!("Order.Items[{index}] is missing"))?;
        items.push(item);
    }
    to.Items = items;
    let counts = match from.Counts.as_ref() {
        Some(counts_src) => {
            let mut counts = Vec::with_capacity(counts_src.len());
            for item in counts_src.iter() {
                counts.push(i64::from(item.clone()));
            }
            Some(counts)
        }
        None => None,
    };
    to.Counts = counts;
    Ok(to)
}
