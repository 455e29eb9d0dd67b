//! Folding a meal plan's ingredient lines into shopping-list entries.
use std::collections::HashMap;

use uuid::Uuid;

use crate::meal_plans::repo_types::PlanIngredientRow;

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedIngredient {
    pub ingredient_id: Uuid,
    pub name: String,
    pub quantity: f64,
    pub unit: Option<String>,
}

/// One entry per distinct ingredient, in order of first appearance, with quantities summed.
///
/// Units are not converted: an entry keeps the unit and name of its first line.
pub fn aggregate_ingredients(rows: &[PlanIngredientRow]) -> Vec<AggregatedIngredient> {
    let mut out: Vec<AggregatedIngredient> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for row in rows {
        match index.get(&row.ingredient_id) {
            Some(&i) => out[i].quantity += row.quantity,
            None => {
                index.insert(row.ingredient_id, out.len());
                out.push(AggregatedIngredient {
                    ingredient_id: row.ingredient_id,
                    name: row.ingredient_name.clone(),
                    quantity: row.quantity,
                    unit: row.unit.clone(),
                });
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: Uuid, name: &str, quantity: f64, unit: Option<&str>) -> PlanIngredientRow {
        PlanIngredientRow {
            ingredient_id: id,
            ingredient_name: name.into(),
            quantity,
            unit: unit.map(Into::into),
        }
    }

    #[test]
    fn sums_same_ingredient() {
        let a = Uuid::new_v4();
        let out = aggregate_ingredients(&[
            row(a, "A", 2.0, Some("cup")),
            row(a, "A", 1.5, Some("cup")),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].quantity, 3.5);
        assert_eq!(out[0].unit.as_deref(), Some("cup"));
    }

    #[test]
    fn keeps_first_seen_order_and_first_unit() {
        let flour = Uuid::new_v4();
        let eggs = Uuid::new_v4();
        let out = aggregate_ingredients(&[
            row(eggs, "Eggs", 2.0, None),
            row(flour, "Flour", 200.0, Some("g")),
            row(eggs, "Eggs", 1.0, Some("piece")),
            row(flour, "Flour", 0.5, Some("kg")),
        ]);
        let summary: Vec<(&str, f64, Option<&str>)> = out
            .iter()
            .map(|i| (i.name.as_str(), i.quantity, i.unit.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![("Eggs", 3.0, None), ("Flour", 200.5, Some("g"))]
        );
    }

    #[test]
    fn empty_plan_yields_nothing() {
        assert!(aggregate_ingredients(&[]).is_empty());
    }
}
