// Copyright 2023 Remi Bernotavicius

//! The repository is stored as one JSON document. Documents written by older versions of the
//! app use a few different shapes; everything that reads a document goes through
//! [`normalize`] before decoding so the rest of the program only sees the current shape.

use serde_json::{json, Map, Value};

/// Overwrite `base` key-by-key with the top-level keys of `overlay`. Nested values are
/// replaced whole, never merged.
pub fn shallow_merge(base: &mut Value, overlay: Value) {
    let Value::Object(overlay) = overlay else {
        return;
    };
    match base {
        Value::Object(base) => {
            for (key, value) in overlay {
                base.insert(key, value);
            }
        }
        other => *other = Value::Object(overlay),
    }
}

pub fn normalize(document: &mut Value) {
    let Some(document) = document.as_object_mut() else {
        return;
    };
    for_each_entry(document, "ingredients", normalize_ingredient);
    for_each_entry(document, "recipes", normalize_recipe);
    for_each_entry(document, "products", normalize_product);
    for_each_entry(document, "packaging", normalize_packaging);
    for_each_entry(document, "nutrition", normalize_nutrients);
    for_each_entry(document, "recipeNutrition", normalize_nutrients);
}

fn for_each_entry(document: &mut Map<String, Value>, key: &str, f: fn(&mut Map<String, Value>)) {
    if let Some(Value::Array(items)) = document.get_mut(key) {
        for item in items.iter_mut().filter_map(Value::as_object_mut) {
            f(item);
        }
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    let n: Option<f64> = match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

fn integer(value: Option<&Value>) -> Option<u64> {
    number(value)
        .map(f64::trunc)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u64)
}

fn set_number(entry: &mut Map<String, Value>, key: &str, default: f64) {
    let n = number(entry.get(key)).unwrap_or(default);
    entry.insert(key.into(), json!(n));
}

fn set_text(entry: &mut Map<String, Value>, key: &str) {
    let text = match entry.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    entry.insert(key.into(), json!(text));
}

/// Keeps only the array entries whose `key` holds a usable id, rewriting that id as an integer.
fn retain_with_id(lines: &mut Vec<Value>, key: &str) {
    lines.retain_mut(|line| {
        let Some(line) = line.as_object_mut() else {
            return false;
        };
        match integer(line.get(key)).filter(|id| *id > 0) {
            Some(id) => {
                line.insert(key.into(), json!(id));
                true
            }
            None => false,
        }
    });
}

fn take_lines(entry: &mut Map<String, Value>, key: &str) -> Vec<Value> {
    match entry.remove(key) {
        Some(Value::Array(lines)) => lines,
        Some(Value::Object(single)) => vec![Value::Object(single)],
        _ => vec![],
    }
}

fn normalize_ingredient(entry: &mut Map<String, Value>) {
    set_text(entry, "name");
    set_text(entry, "unit");
    set_number(entry, "price", 0.0);
}

fn normalize_recipe(entry: &mut Map<String, Value>) {
    set_text(entry, "name");
    let servings = integer(entry.get("servings")).unwrap_or(0).max(1);
    entry.insert("servings".into(), json!(servings));

    match number(entry.get("totalWeight")) {
        Some(weight) => entry.insert("totalWeight".into(), json!(weight)),
        None => entry.remove("totalWeight"),
    };

    let mut lines = take_lines(entry, "ingredients");
    retain_with_id(&mut lines, "ingredientId");
    for line in lines.iter_mut().filter_map(Value::as_object_mut) {
        let amount = number(line.get("amount"))
            .filter(|a| *a > 0.0)
            .or_else(|| number(line.get("weight")))
            .unwrap_or(0.0);
        line.remove("weight");
        line.insert("amount".into(), json!(amount));
    }
    entry.insert("ingredients".into(), Value::Array(lines));
}

fn normalize_product(entry: &mut Map<String, Value>) {
    set_text(entry, "name");
    set_number(entry, "sellingPrice", 0.0);

    let mut recipes = take_lines(entry, "recipes");
    retain_with_id(&mut recipes, "recipeId");
    for line in recipes.iter_mut().filter_map(Value::as_object_mut) {
        let amount = number(line.get("amount"))
            .filter(|a| *a > 0.0)
            .or_else(|| number(line.get("weight")))
            .unwrap_or(0.0);
        let unit = match line.get("unit").and_then(Value::as_str) {
            Some("serving") => "serving",
            _ => "weight",
        };
        line.remove("weight");
        line.insert("amount".into(), json!(amount));
        line.insert("unit".into(), json!(unit));
    }
    entry.insert("recipes".into(), Value::Array(recipes));

    let mut packaging = take_lines(entry, "packaging");
    retain_with_id(&mut packaging, "packagingId");
    for line in packaging.iter_mut().filter_map(Value::as_object_mut) {
        let quantity = integer(line.get("quantity")).unwrap_or(0).max(1);
        line.insert("quantity".into(), json!(quantity));
    }
    entry.insert("packaging".into(), Value::Array(packaging));
}

fn normalize_packaging(entry: &mut Map<String, Value>) {
    set_text(entry, "name");
    set_number(entry, "cost", 0.0);
}

fn normalize_nutrients(entry: &mut Map<String, Value>) {
    for key in [
        "calories",
        "protein",
        "fat",
        "saturatedFat",
        "transFat",
        "carbs",
        "sugar",
        "sodium",
    ] {
        set_number(entry, key, 0.0);
    }
}

#[test]
fn legacy_single_packaging_becomes_a_list() {
    let mut doc = json!({
        "products": [{
            "id": 1,
            "name": "禮盒",
            "recipes": [{ "recipeId": 2, "weight": 300 }],
            "packaging": { "packagingId": 3, "quantity": 0 }
        }]
    });
    normalize(&mut doc);

    let product = &doc["products"][0];
    assert_eq!(product["packaging"], json!([{ "packagingId": 3, "quantity": 1 }]));
    assert_eq!(
        product["recipes"],
        json!([{ "recipeId": 2, "amount": 300.0, "unit": "weight" }])
    );
    assert_eq!(product["sellingPrice"], json!(0.0));
}

#[test]
fn recipe_fields_are_coerced() {
    let mut doc = json!({
        "recipes": [{
            "id": 1,
            "name": "海綿蛋糕",
            "servings": "6",
            "totalWeight": 0,
            "ingredients": [
                { "ingredientId": "1", "amount": "500" },
                { "ingredientId": null, "amount": 20 }
            ]
        }, {
            "id": 2,
            "name": "白吐司",
            "servings": 0
        }]
    });
    normalize(&mut doc);

    let recipes = &doc["recipes"];
    assert_eq!(recipes[0]["servings"], json!(6));
    assert_eq!(recipes[0]["totalWeight"], json!(0.0));
    assert_eq!(
        recipes[0]["ingredients"],
        json!([{ "ingredientId": 1, "amount": 500.0 }])
    );
    assert_eq!(recipes[1]["servings"], json!(1));
    assert_eq!(recipes[1]["ingredients"], json!([]));
    assert!(recipes[1].get("totalWeight").is_none());
}

#[test]
fn merge_is_shallow() {
    let mut base = json!({
        "ingredients": [{ "id": 1 }],
        "packaging": [{ "id": 1 }, { "id": 2 }]
    });
    shallow_merge(&mut base, json!({ "packaging": [], "extra": true }));
    assert_eq!(
        base,
        json!({ "ingredients": [{ "id": 1 }], "packaging": [], "extra": true })
    );
}
