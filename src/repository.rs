// Copyright 2023 Remi Bernotavicius

use crate::costing::Catalog;
use crate::database::document;
use crate::database::models::{
    Identified, Ingredient, IngredientId, IngredientUnit, NutritionFact, NutritionId, Nutrients,
    Packaging, PackagingId, PackagingLine, Product, ProductId, ProductRecipeLine, Recipe,
    RecipeId, RecipeLine, RecipeNutrition,
};
use crate::nutrition;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use strum::EnumIter;

#[derive(Debug, Display, EnumIter, Hash, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
pub enum EntityKind {
    #[display("原料")]
    Ingredients,
    #[display("配方")]
    Recipes,
    #[display("商品")]
    Products,
    #[display("包裝")]
    Packaging,
    #[display("營養成分")]
    Nutrition,
    #[display("配方營養成分")]
    RecipeNutrition,
}

impl EntityKind {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    /// Derived kinds are rebuilt by the repository and never edited directly.
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::RecipeNutrition)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("{field} must be a non-negative number, got {value}")]
    InvalidNumber { field: &'static str, value: f64 },
    #[error("a recipe needs at least one ingredient")]
    NoIngredientLines,
    #[error("a product needs at least one recipe")]
    NoRecipeLines,
    #[error("no {kind} with id {id}")]
    NotFound { kind: EntityKind, id: u32 },
    #[error("{0} is computed from other data and cannot be changed directly")]
    Derived(EntityKind),
    #[error("no ids left for new {0}")]
    IdsExhausted(EntityKind),
}

type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IngredientInput {
    pub name: String,
    pub category: Option<String>,
    pub unit: IngredientUnit,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeInput {
    pub name: String,
    pub category: Option<String>,
    pub servings: u32,
    pub total_weight_override: Option<f64>,
    pub ingredient_lines: Vec<RecipeLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductInput {
    pub name: String,
    pub category: Option<String>,
    pub selling_price: f64,
    pub recipe_lines: Vec<ProductRecipeLine>,
    pub packaging_lines: Vec<PackagingLine>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackagingInput {
    pub name: String,
    pub category: Option<String>,
    pub cost: f64,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NutritionInput {
    pub ingredient_name: String,
    pub per_100g: Nutrients,
}

/// Everything the repository owns, in the shape it is persisted and backed up in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataStore {
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub packaging: Vec<Packaging>,
    #[serde(default)]
    pub nutrition: Vec<NutritionFact>,
    #[serde(default)]
    pub recipe_nutrition: Vec<RecipeNutrition>,
}

fn next_id<T: Identified>(kind: EntityKind, items: &[T]) -> Result<u32> {
    match items.iter().map(|i| i.raw_id()).max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or(ValidationError::IdsExhausted(kind)),
    }
}

fn required_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        Err(ValidationError::EmptyName)
    } else {
        Ok(name.into())
    }
}

fn non_negative(field: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ValidationError::InvalidNumber { field, value })
    }
}

fn optional_label(label: Option<String>) -> Option<String> {
    label
        .map(|l| l.trim().to_owned())
        .filter(|l| !l.is_empty())
}

const NUTRIENT_FIELDS: [&str; 8] = [
    "calories",
    "protein",
    "fat",
    "saturatedFat",
    "transFat",
    "carbs",
    "sugar",
    "sodium",
];

fn remove_ids<T: Identified>(items: &mut Vec<T>, ids: &HashSet<u32>) -> usize {
    let before = items.len();
    items.retain(|i| !ids.contains(&i.raw_id()));
    before - items.len()
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repository {
    store: DataStore,
}

impl Repository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes a stored document, merging its top-level keys over an empty store.
    pub fn from_document(doc: serde_json::Value) -> serde_json::Result<Self> {
        let mut repository = Self::new();
        repository.restore(doc)?;
        Ok(repository)
    }

    pub fn to_document(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(&self.store)
    }

    /// Overwrites every collection named in `data`, leaving the others alone. Nothing changes
    /// if the merged data does not decode.
    pub fn restore(&mut self, data: serde_json::Value) -> serde_json::Result<()> {
        let mut merged = self.to_document()?;
        document::shallow_merge(&mut merged, data);
        document::normalize(&mut merged);
        self.store = serde_json::from_value(merged)?;
        self.recompute_nutrition();
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.store = DataStore::default();
        self.recompute_nutrition();
    }

    pub fn recompute_nutrition(&mut self) {
        self.store.recipe_nutrition = nutrition::recompute_all(
            &self.store.recipes,
            &self.store.ingredients,
            &self.store.nutrition,
        );
    }

    pub fn ingredients(&self) -> &[Ingredient] {
        &self.store.ingredients
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.store.recipes
    }

    pub fn products(&self) -> &[Product] {
        &self.store.products
    }

    pub fn packaging(&self) -> &[Packaging] {
        &self.store.packaging
    }

    pub fn nutrition(&self) -> &[NutritionFact] {
        &self.store.nutrition
    }

    pub fn recipe_nutrition(&self) -> &[RecipeNutrition] {
        &self.store.recipe_nutrition
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog {
            ingredients: &self.store.ingredients,
            recipes: &self.store.recipes,
            packaging: &self.store.packaging,
        }
    }

    pub fn len(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Ingredients => self.store.ingredients.len(),
            EntityKind::Recipes => self.store.recipes.len(),
            EntityKind::Products => self.store.products.len(),
            EntityKind::Packaging => self.store.packaging.len(),
            EntityKind::Nutrition => self.store.nutrition.len(),
            EntityKind::RecipeNutrition => self.store.recipe_nutrition.len(),
        }
    }

    pub fn ingredient(&self, id: IngredientId) -> Option<&Ingredient> {
        self.catalog().ingredient(id)
    }

    pub fn recipe(&self, id: RecipeId) -> Option<&Recipe> {
        self.catalog().recipe(id)
    }

    pub fn product(&self, id: ProductId) -> Option<&Product> {
        self.store.products.iter().find(|p| p.id == id)
    }

    pub fn packaging_item(&self, id: PackagingId) -> Option<&Packaging> {
        self.catalog().packaging(id)
    }

    pub fn ingredient_by_name(&self, name: &str) -> Option<&Ingredient> {
        self.store.ingredients.iter().find(|i| i.name == name)
    }

    pub fn recipe_by_name(&self, name: &str) -> Option<&Recipe> {
        self.store.recipes.iter().find(|r| r.name == name)
    }

    pub fn product_by_name(&self, name: &str) -> Option<&Product> {
        self.store.products.iter().find(|p| p.name == name)
    }

    pub fn packaging_by_name(&self, name: &str) -> Option<&Packaging> {
        self.store.packaging.iter().find(|p| p.name == name)
    }

    pub fn nutrition_for_ingredient(&self, ingredient_name: &str) -> Option<&NutritionFact> {
        self.store
            .nutrition
            .iter()
            .find(|n| n.ingredient_name == ingredient_name)
    }

    fn validate_ingredient(input: IngredientInput, id: IngredientId) -> Result<Ingredient> {
        Ok(Ingredient {
            id,
            name: required_name(&input.name)?,
            category: optional_label(input.category),
            unit: input.unit,
            price: non_negative("price", input.price)?,
        })
    }

    pub fn add_ingredient(&mut self, input: IngredientInput) -> Result<IngredientId> {
        let id = IngredientId(next_id(EntityKind::Ingredients, &self.store.ingredients)?);
        let ingredient = Self::validate_ingredient(input, id)?;
        self.store.ingredients.push(ingredient);
        self.recompute_nutrition();
        Ok(id)
    }

    pub fn edit_ingredient(&mut self, id: IngredientId, input: IngredientInput) -> Result<()> {
        let ingredient = Self::validate_ingredient(input, id)?;
        let slot = self
            .store
            .ingredients
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(ValidationError::NotFound {
                kind: EntityKind::Ingredients,
                id: id.0,
            })?;
        *slot = ingredient;
        self.recompute_nutrition();
        Ok(())
    }

    pub fn upsert_ingredient(&mut self, input: IngredientInput) -> Result<Upserted> {
        match self.ingredient_by_name(input.name.trim()).map(|i| i.id) {
            Some(id) => self.edit_ingredient(id, input).map(|_| Upserted::Updated),
            None => self.add_ingredient(input).map(|_| Upserted::Created),
        }
    }

    fn validate_recipe(
        &self,
        input: RecipeInput,
        id: RecipeId,
        require_lines: bool,
    ) -> Result<Recipe> {
        let name = required_name(&input.name)?;
        let total_weight_override = match input.total_weight_override {
            Some(weight) => Some(non_negative("totalWeight", weight)?).filter(|w| *w > 0.0),
            None => None,
        };
        let ingredient_lines: Vec<_> = input
            .ingredient_lines
            .into_iter()
            .filter(|l| l.amount_grams.is_finite() && l.amount_grams > 0.0)
            .filter(|l| self.ingredient(l.ingredient_id).is_some())
            .collect();
        if require_lines && ingredient_lines.is_empty() {
            return Err(ValidationError::NoIngredientLines);
        }
        Ok(Recipe {
            id,
            name,
            category: optional_label(input.category),
            servings: input.servings.max(1),
            total_weight_override,
            ingredient_lines,
        })
    }

    pub fn add_recipe(&mut self, input: RecipeInput) -> Result<RecipeId> {
        let id = RecipeId(next_id(EntityKind::Recipes, &self.store.recipes)?);
        let recipe = self.validate_recipe(input, id, true)?;
        self.store.recipes.push(recipe);
        self.recompute_nutrition();
        Ok(id)
    }

    fn replace_recipe(&mut self, recipe: Recipe) -> Result<()> {
        let slot = self
            .store
            .recipes
            .iter_mut()
            .find(|r| r.id == recipe.id)
            .ok_or(ValidationError::NotFound {
                kind: EntityKind::Recipes,
                id: recipe.id.0,
            })?;
        *slot = recipe;
        self.recompute_nutrition();
        Ok(())
    }

    pub fn edit_recipe(&mut self, id: RecipeId, input: RecipeInput) -> Result<()> {
        let recipe = self.validate_recipe(input, id, true)?;
        self.replace_recipe(recipe)
    }

    /// Spreadsheet rows may carry no ingredients, so unlike `add_recipe` an empty line list is
    /// accepted here.
    pub fn upsert_recipe(&mut self, input: RecipeInput) -> Result<Upserted> {
        match self.recipe_by_name(input.name.trim()).map(|r| r.id) {
            Some(id) => {
                let recipe = self.validate_recipe(input, id, false)?;
                self.replace_recipe(recipe).map(|_| Upserted::Updated)
            }
            None => {
                let id = RecipeId(next_id(EntityKind::Recipes, &self.store.recipes)?);
                let recipe = self.validate_recipe(input, id, false)?;
                self.store.recipes.push(recipe);
                self.recompute_nutrition();
                Ok(Upserted::Created)
            }
        }
    }

    fn validate_product(
        &self,
        input: ProductInput,
        id: ProductId,
        require_lines: bool,
    ) -> Result<Product> {
        let name = required_name(&input.name)?;
        let selling_price = non_negative("sellingPrice", input.selling_price)?;
        let recipe_lines: Vec<_> = input
            .recipe_lines
            .into_iter()
            .filter(|l| l.quantity.is_finite() && l.quantity > 0.0)
            .filter(|l| self.recipe(l.recipe_id).is_some())
            .collect();
        if require_lines && recipe_lines.is_empty() {
            return Err(ValidationError::NoRecipeLines);
        }
        let packaging_lines = input
            .packaging_lines
            .into_iter()
            .filter(|l| self.packaging_item(l.packaging_id).is_some())
            .map(|l| PackagingLine {
                quantity: l.quantity.max(1),
                ..l
            })
            .collect();
        Ok(Product {
            id,
            name,
            category: optional_label(input.category),
            selling_price,
            recipe_lines,
            packaging_lines,
        })
    }

    pub fn add_product(&mut self, input: ProductInput) -> Result<ProductId> {
        let id = ProductId(next_id(EntityKind::Products, &self.store.products)?);
        let product = self.validate_product(input, id, true)?;
        self.store.products.push(product);
        Ok(id)
    }

    pub fn edit_product(&mut self, id: ProductId, input: ProductInput) -> Result<()> {
        let product = self.validate_product(input, id, true)?;
        let slot = self
            .store
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ValidationError::NotFound {
                kind: EntityKind::Products,
                id: id.0,
            })?;
        *slot = product;
        Ok(())
    }

    /// Updates only the name, category and price of an existing product, keeping its recipe
    /// and packaging lines. A new product takes the lines given in `input`.
    pub fn upsert_product(&mut self, input: ProductInput) -> Result<Upserted> {
        let id = match self.product_by_name(input.name.trim()) {
            Some(existing) => existing.id,
            None => ProductId(next_id(EntityKind::Products, &self.store.products)?),
        };
        let product = self.validate_product(input, id, false)?;
        match self.store.products.iter_mut().find(|p| p.id == id) {
            Some(slot) => {
                slot.name = product.name;
                slot.category = product.category;
                slot.selling_price = product.selling_price;
                Ok(Upserted::Updated)
            }
            None => {
                self.store.products.push(product);
                Ok(Upserted::Created)
            }
        }
    }

    fn validate_packaging(input: PackagingInput, id: PackagingId) -> Result<Packaging> {
        Ok(Packaging {
            id,
            name: required_name(&input.name)?,
            category: optional_label(input.category),
            cost: non_negative("cost", input.cost)?,
            note: optional_label(input.note),
        })
    }

    pub fn add_packaging(&mut self, input: PackagingInput) -> Result<PackagingId> {
        let id = PackagingId(next_id(EntityKind::Packaging, &self.store.packaging)?);
        let packaging = Self::validate_packaging(input, id)?;
        self.store.packaging.push(packaging);
        Ok(id)
    }

    pub fn edit_packaging(&mut self, id: PackagingId, input: PackagingInput) -> Result<()> {
        let packaging = Self::validate_packaging(input, id)?;
        let slot = self
            .store
            .packaging
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ValidationError::NotFound {
                kind: EntityKind::Packaging,
                id: id.0,
            })?;
        *slot = packaging;
        Ok(())
    }

    pub fn upsert_packaging(&mut self, input: PackagingInput) -> Result<Upserted> {
        match self.packaging_by_name(input.name.trim()).map(|p| p.id) {
            Some(id) => self.edit_packaging(id, input).map(|_| Upserted::Updated),
            None => self.add_packaging(input).map(|_| Upserted::Created),
        }
    }

    fn validate_nutrition(input: NutritionInput, id: NutritionId) -> Result<NutritionFact> {
        let ingredient_name = required_name(&input.ingredient_name)?;
        for (field, value) in NUTRIENT_FIELDS.into_iter().zip(input.per_100g.values()) {
            non_negative(field, value)?;
        }
        Ok(NutritionFact {
            id,
            ingredient_name,
            per_100g: input.per_100g,
        })
    }

    pub fn add_nutrition(&mut self, input: NutritionInput) -> Result<NutritionId> {
        let id = NutritionId(next_id(EntityKind::Nutrition, &self.store.nutrition)?);
        let fact = Self::validate_nutrition(input, id)?;
        self.store.nutrition.push(fact);
        self.recompute_nutrition();
        Ok(id)
    }

    pub fn edit_nutrition(&mut self, id: NutritionId, input: NutritionInput) -> Result<()> {
        let fact = Self::validate_nutrition(input, id)?;
        let slot = self
            .store
            .nutrition
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(ValidationError::NotFound {
                kind: EntityKind::Nutrition,
                id: id.0,
            })?;
        *slot = fact;
        self.recompute_nutrition();
        Ok(())
    }

    pub fn upsert_nutrition(&mut self, input: NutritionInput) -> Result<Upserted> {
        match self
            .nutrition_for_ingredient(input.ingredient_name.trim())
            .map(|n| n.id)
        {
            Some(id) => self.edit_nutrition(id, input).map(|_| Upserted::Updated),
            None => self.add_nutrition(input).map(|_| Upserted::Created),
        }
    }

    /// Removes every entity of `kind` whose id is in `ids` and returns how many were removed.
    /// References to removed entities are left in place and skipped when costing.
    pub fn delete(&mut self, kind: EntityKind, ids: &HashSet<u32>) -> Result<usize> {
        let removed = match kind {
            EntityKind::Ingredients => remove_ids(&mut self.store.ingredients, ids),
            EntityKind::Recipes => remove_ids(&mut self.store.recipes, ids),
            EntityKind::Products => remove_ids(&mut self.store.products, ids),
            EntityKind::Packaging => remove_ids(&mut self.store.packaging, ids),
            EntityKind::Nutrition => remove_ids(&mut self.store.nutrition, ids),
            EntityKind::RecipeNutrition => return Err(ValidationError::Derived(kind)),
        };
        if matches!(
            kind,
            EntityKind::Ingredients | EntityKind::Recipes | EntityKind::Nutrition
        ) {
            self.recompute_nutrition();
        }
        Ok(removed)
    }

    /// Fills the ingredient, packaging and nutrition collections with a starter set when they
    /// are empty. Returns whether anything was added.
    pub fn seed_samples_if_empty(&mut self) -> bool {
        let mut seeded = false;
        if self.store.ingredients.is_empty() {
            let samples = [
                ("麵粉", "粉類", IngredientUnit::Kilogram, 35.0),
                ("雞蛋", "蛋奶類", IngredientUnit::Piece, 8.0),
                ("奶油", "油脂類", IngredientUnit::Kilogram, 180.0),
                ("砂糖", "糖類", IngredientUnit::Kilogram, 25.0),
                ("牛奶", "蛋奶類", IngredientUnit::Liter, 65.0),
            ];
            for (id, (name, category, unit, price)) in (1..).zip(samples) {
                self.store.ingredients.push(Ingredient {
                    id: IngredientId(id),
                    name: name.into(),
                    category: Some(category.into()),
                    unit,
                    price,
                });
            }
            seeded = true;
        }
        if self.store.packaging.is_empty() {
            let samples = [
                ("蛋糕盒 6吋", "盒子", 15.0, "白色硬紙盒"),
                ("蛋糕盒 8吋", "盒子", 25.0, "白色硬紙盒"),
                ("餅乾袋", "袋子", 2.0, "透明塑膠袋"),
            ];
            for (id, (name, category, cost, note)) in (1..).zip(samples) {
                self.store.packaging.push(Packaging {
                    id: PackagingId(id),
                    name: name.into(),
                    category: Some(category.into()),
                    cost,
                    note: Some(note.into()),
                });
            }
            seeded = true;
        }
        if self.store.nutrition.is_empty() {
            let samples = [
                ("麵粉", [364.0, 10.3, 0.98, 0.2, 0.0, 76.0, 0.3, 2.0]),
                ("雞蛋", [155.0, 13.0, 11.0, 3.1, 0.0, 1.1, 0.6, 124.0]),
                ("奶油", [717.0, 0.85, 81.0, 51.0, 1.5, 0.06, 0.06, 11.0]),
            ];
            for (id, (ingredient_name, values)) in (1..).zip(samples) {
                self.store.nutrition.push(NutritionFact {
                    id: NutritionId(id),
                    ingredient_name: ingredient_name.into(),
                    per_100g: Nutrients::from_values(values),
                });
            }
            seeded = true;
        }
        if seeded {
            self.recompute_nutrition();
        }
        seeded
    }
}

#[cfg(test)]
use crate::costing::fixtures::assert_close;
#[cfg(test)]
use crate::database::models::QuantityUnit;
#[cfg(test)]
use maplit::hashset;

#[cfg(test)]
fn flour_input() -> IngredientInput {
    IngredientInput {
        name: "麵粉".into(),
        category: Some("粉類".into()),
        unit: IngredientUnit::Kilogram,
        price: 35.0,
    }
}

#[cfg(test)]
fn cake_input(ingredient: IngredientId, amount: f64) -> RecipeInput {
    RecipeInput {
        name: "海綿蛋糕".into(),
        category: None,
        servings: 6,
        total_weight_override: None,
        ingredient_lines: vec![RecipeLine {
            ingredient_id: ingredient,
            amount_grams: amount,
        }],
    }
}

#[cfg(test)]
fn flour_fact() -> NutritionInput {
    NutritionInput {
        ingredient_name: "麵粉".into(),
        per_100g: Nutrients {
            calories: 364.0,
            ..Nutrients::zero()
        },
    }
}

#[test]
fn ids_are_max_plus_one() {
    let mut repo = Repository::new();
    let a = repo.add_ingredient(flour_input()).unwrap();
    let b = repo
        .add_ingredient(IngredientInput {
            name: "雞蛋".into(),
            ..flour_input()
        })
        .unwrap();
    assert_eq!((a, b), (IngredientId(1), IngredientId(2)));

    repo.delete(EntityKind::Ingredients, &hashset! {1}).unwrap();
    let c = repo
        .add_ingredient(IngredientInput {
            name: "奶油".into(),
            ..flour_input()
        })
        .unwrap();
    assert_eq!(c, IngredientId(3));

    repo.delete(EntityKind::Ingredients, &hashset! {2, 3}).unwrap();
    let d = repo.add_ingredient(flour_input()).unwrap();
    assert_eq!(d, IngredientId(1));
}

#[test]
fn exhausted_ids_are_an_error() {
    let mut repo = Repository::new();
    let data = serde_json::json!({
        "ingredients": [{ "id": u32::MAX, "name": "麵粉", "unit": "公斤", "price": 35 }],
        "products": [{ "id": u32::MAX, "name": "餅乾禮盒", "sellingPrice": 250 }]
    });
    repo.restore(data).unwrap();
    let before = repo.clone();

    assert_eq!(
        repo.add_ingredient(IngredientInput {
            name: "雞蛋".into(),
            ..flour_input()
        }),
        Err(ValidationError::IdsExhausted(EntityKind::Ingredients))
    );
    let new_product = ProductInput {
        name: "新商品".into(),
        category: None,
        selling_price: 100.0,
        recipe_lines: vec![],
        packaging_lines: vec![],
    };
    assert_eq!(
        repo.upsert_product(new_product),
        Err(ValidationError::IdsExhausted(EntityKind::Products))
    );
    assert_eq!(repo, before);
}

#[test]
fn validation_leaves_repository_untouched() {
    let mut repo = Repository::new();
    let flour = repo.add_ingredient(flour_input()).unwrap();
    let before = repo.clone();

    let blank = IngredientInput {
        name: "  ".into(),
        ..flour_input()
    };
    assert_eq!(repo.add_ingredient(blank), Err(ValidationError::EmptyName));

    let negative = IngredientInput {
        price: -1.0,
        ..flour_input()
    };
    assert!(matches!(
        repo.edit_ingredient(flour, negative),
        Err(ValidationError::InvalidNumber { field: "price", .. })
    ));

    let nan = IngredientInput {
        price: f64::NAN,
        ..flour_input()
    };
    assert!(repo.add_ingredient(nan).is_err());

    assert_eq!(
        repo.add_recipe(cake_input(flour, 0.0)),
        Err(ValidationError::NoIngredientLines)
    );
    assert_eq!(
        repo.add_recipe(cake_input(IngredientId(9), 500.0)),
        Err(ValidationError::NoIngredientLines)
    );
    assert_eq!(
        repo.edit_recipe(RecipeId(4), cake_input(flour, 500.0)),
        Err(ValidationError::NotFound {
            kind: EntityKind::Recipes,
            id: 4
        })
    );
    assert_eq!(repo, before);
}

#[test]
fn nutrition_follows_every_mutation() {
    let mut repo = Repository::new();
    let flour = repo.add_ingredient(flour_input()).unwrap();
    let cake = repo.add_recipe(cake_input(flour, 500.0)).unwrap();
    assert_eq!(repo.recipe_nutrition().len(), 1);
    assert_eq!(repo.recipe_nutrition()[0].totals.calories, 0.0);

    let fact = repo.add_nutrition(flour_fact()).unwrap();
    assert_close(repo.recipe_nutrition()[0].totals.calories, 1820.0);

    repo.edit_recipe(cake, cake_input(flour, 250.0)).unwrap();
    assert_close(repo.recipe_nutrition()[0].totals.calories, 910.0);

    repo.edit_ingredient(
        flour,
        IngredientInput {
            name: "高筋麵粉".into(),
            ..flour_input()
        },
    )
    .unwrap();
    assert_eq!(repo.recipe_nutrition()[0].totals.calories, 0.0);

    repo.edit_nutrition(
        fact,
        NutritionInput {
            ingredient_name: "高筋麵粉".into(),
            ..flour_fact()
        },
    )
    .unwrap();
    assert_close(repo.recipe_nutrition()[0].totals.calories, 910.0);

    repo.delete(EntityKind::Recipes, &hashset! {cake.0}).unwrap();
    assert!(repo.recipe_nutrition().is_empty());
}

#[test]
fn deleting_an_ingredient_leaves_a_dangling_line() {
    let mut repo = Repository::new();
    let flour = repo.add_ingredient(flour_input()).unwrap();
    let butter = repo
        .add_ingredient(IngredientInput {
            name: "奶油".into(),
            price: 180.0,
            ..flour_input()
        })
        .unwrap();
    let mut input = cake_input(flour, 500.0);
    input.ingredient_lines.push(RecipeLine {
        ingredient_id: butter,
        amount_grams: 100.0,
    });
    let cake = repo.add_recipe(input).unwrap();

    assert_eq!(
        repo.delete(EntityKind::Ingredients, &hashset! {butter.0}),
        Ok(1)
    );
    let recipe = repo.recipe(cake).unwrap();
    assert_eq!(recipe.ingredient_lines.len(), 2);
    assert_close(crate::costing::recipe_cost(recipe, repo.ingredients()), 17.5);
}

#[test]
fn products_keep_only_resolvable_lines() {
    let mut repo = Repository::new();
    let flour = repo.add_ingredient(flour_input()).unwrap();
    let cake = repo.add_recipe(cake_input(flour, 500.0)).unwrap();
    let pkg = repo
        .add_packaging(PackagingInput {
            name: "蛋糕盒 6吋".into(),
            category: None,
            cost: 15.0,
            note: Some(" ".into()),
        })
        .unwrap();

    let input = ProductInput {
        name: "6吋海綿蛋糕".into(),
        category: Some("蛋糕".into()),
        selling_price: 380.0,
        recipe_lines: vec![
            ProductRecipeLine {
                recipe_id: cake,
                quantity: 6.0,
                quantity_unit: QuantityUnit::ByServing,
            },
            ProductRecipeLine {
                recipe_id: RecipeId(77),
                quantity: 1.0,
                quantity_unit: QuantityUnit::ByServing,
            },
        ],
        packaging_lines: vec![
            PackagingLine {
                packaging_id: pkg,
                quantity: 0,
            },
            PackagingLine {
                packaging_id: PackagingId(5),
                quantity: 1,
            },
        ],
    };
    let id = repo.add_product(input.clone()).unwrap();
    let product = repo.product(id).unwrap();
    assert_eq!(product.recipe_lines.len(), 1);
    assert_eq!(
        product.packaging_lines,
        vec![PackagingLine {
            packaging_id: pkg,
            quantity: 1
        }]
    );
    assert_eq!(repo.packaging_item(pkg).unwrap().note, None);

    let no_recipes = ProductInput {
        recipe_lines: vec![],
        ..input
    };
    assert_eq!(
        repo.add_product(no_recipes),
        Err(ValidationError::NoRecipeLines)
    );
}

#[test]
fn upsert_matches_by_name() {
    let mut repo = Repository::new();
    let flour = repo.add_ingredient(flour_input()).unwrap();

    let cheaper = IngredientInput {
        price: 30.0,
        ..flour_input()
    };
    assert_eq!(repo.upsert_ingredient(cheaper), Ok(Upserted::Updated));
    assert_eq!(repo.ingredients().len(), 1);
    assert_eq!(repo.ingredient(flour).unwrap().price, 30.0);

    assert_eq!(repo.upsert_nutrition(flour_fact()), Ok(Upserted::Created));
    assert_eq!(repo.upsert_nutrition(flour_fact()), Ok(Upserted::Updated));
    assert_eq!(repo.nutrition().len(), 1);
}

#[test]
fn product_upsert_keeps_lines() {
    let mut repo = Repository::new();
    let flour = repo.add_ingredient(flour_input()).unwrap();
    let cake = repo.add_recipe(cake_input(flour, 500.0)).unwrap();
    let line = ProductRecipeLine {
        recipe_id: cake,
        quantity: 6.0,
        quantity_unit: QuantityUnit::ByServing,
    };
    let id = repo
        .add_product(ProductInput {
            name: "蛋糕".into(),
            category: None,
            selling_price: 300.0,
            recipe_lines: vec![line.clone()],
            packaging_lines: vec![],
        })
        .unwrap();

    let listing = ProductInput {
        name: "蛋糕".into(),
        category: Some("蛋糕".into()),
        selling_price: 350.0,
        recipe_lines: vec![],
        packaging_lines: vec![],
    };
    assert_eq!(repo.upsert_product(listing), Ok(Upserted::Updated));
    let product = repo.product(id).unwrap();
    assert_eq!(product.selling_price, 350.0);
    assert_eq!(product.recipe_lines, vec![line]);
}

#[test]
fn recipe_nutrition_cannot_be_deleted() {
    let mut repo = Repository::new();
    assert_eq!(
        repo.delete(EntityKind::RecipeNutrition, &hashset! {1}),
        Err(ValidationError::Derived(EntityKind::RecipeNutrition))
    );
}

#[test]
fn document_round_trip() {
    let mut repo = Repository::new();
    repo.seed_samples_if_empty();
    let flour = repo.ingredient_by_name("麵粉").unwrap().id;
    repo.add_recipe(cake_input(flour, 500.0)).unwrap();

    let doc = repo.to_document().unwrap();
    assert!(doc["recipeNutrition"].is_array());
    let restored = Repository::from_document(doc).unwrap();
    assert_eq!(restored, repo);
}

#[test]
fn restore_is_shallow_and_all_or_nothing() {
    let mut repo = Repository::new();
    repo.seed_samples_if_empty();
    let before = repo.clone();

    let bad = serde_json::json!({ "ingredients": [{ "name": "no id" }] });
    assert!(repo.restore(bad).is_err());
    assert_eq!(repo, before);

    let data = serde_json::json!({
        "ingredients": [{ "id": 7, "name": "可可粉", "unit": "公斤", "price": 300 }]
    });
    repo.restore(data).unwrap();
    assert_eq!(repo.ingredients().len(), 1);
    assert_eq!(repo.ingredients()[0].id, IngredientId(7));
    assert_eq!(repo.packaging(), before.packaging());
    assert_eq!(repo.nutrition(), before.nutrition());
}

#[test]
fn seeding_only_fills_empty_collections() {
    let mut repo = Repository::new();
    assert!(repo.seed_samples_if_empty());
    assert_eq!(repo.len(EntityKind::Ingredients), 5);
    assert_eq!(repo.len(EntityKind::Packaging), 3);
    assert_eq!(repo.len(EntityKind::Nutrition), 3);
    assert_eq!(repo.ingredients()[4].id, IngredientId(5));
    assert!(!repo.seed_samples_if_empty());

    repo.clear_all();
    for kind in EntityKind::iter() {
        assert_eq!(repo.len(kind), 0);
    }
}
