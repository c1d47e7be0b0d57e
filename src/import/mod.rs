// Copyright 2023 Remi Bernotavicius

use crate::database::models::{IngredientUnit, Nutrients, RecipeLine};
use crate::repository::{
    EntityKind, IngredientInput, NutritionInput, PackagingInput, ProductInput, RecipeInput,
    Repository, Upserted, ValidationError,
};
use std::path::{Path, PathBuf};

pub mod grid;

use grid::GridRow;

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse spreadsheet: {0}")]
    Csv(#[from] csv::Error),
    #[error("the file needs a header row and at least one data row")]
    TooFewRows,
    #[error("{0} cannot be imported")]
    Unsupported(EntityKind),
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RowError {
    #[error("expected at least {expected} columns, found {found}")]
    TooFewColumns { expected: usize, found: usize },
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{field} is not a number: {value:?}")]
    NotANumber { field: &'static str, value: String },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub succeeded: usize,
    pub failed: usize,
}

struct Row<'a> {
    cells: &'a [String],
}

impl<'a> Row<'a> {
    fn expect_columns(&self, expected: usize) -> Result<(), RowError> {
        if self.cells.len() < expected {
            return Err(RowError::TooFewColumns {
                expected,
                found: self.cells.len(),
            });
        }
        Ok(())
    }

    fn cell(&self, index: usize) -> &'a str {
        self.cells.get(index).map_or("", |c| c.trim())
    }

    fn text(&self, index: usize) -> Option<String> {
        Some(self.cell(index))
            .filter(|c| !c.is_empty())
            .map(String::from)
    }

    fn required(&self, index: usize, field: &'static str) -> Result<String, RowError> {
        self.text(index).ok_or(RowError::MissingField(field))
    }

    fn number(&self, index: usize, field: &'static str) -> Result<f64, RowError> {
        let value = self.cell(index);
        value
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .ok_or_else(|| RowError::NotANumber {
                field,
                value: value.into(),
            })
    }

    fn number_or(&self, index: usize, default: f64) -> f64 {
        self.number(index, "").unwrap_or(default)
    }
}

/// Parses `name:amount,name:amount`, keeping pairs whose name is a known ingredient and whose
/// amount is positive.
fn ingredient_list(repository: &Repository, list: &str) -> Vec<RecipeLine> {
    list.split(',')
        .filter_map(|pair| {
            let (name, amount) = pair.rsplit_once(':')?;
            let amount: f64 = amount.trim().parse().ok()?;
            let ingredient = repository.ingredient_by_name(name.trim())?;
            (amount.is_finite() && amount > 0.0).then_some(RecipeLine {
                ingredient_id: ingredient.id,
                amount_grams: amount,
            })
        })
        .collect()
}

fn import_ingredient(repository: &mut Repository, row: Row<'_>) -> Result<Upserted, RowError> {
    row.expect_columns(3)?;
    let input = IngredientInput {
        name: row.required(0, "name")?,
        category: row.text(1),
        unit: IngredientUnit::import(&row.required(2, "unit")?),
        price: row.number(3, "price")?,
    };
    Ok(repository.upsert_ingredient(input)?)
}

fn import_recipe(repository: &mut Repository, row: Row<'_>) -> Result<Upserted, RowError> {
    row.expect_columns(2)?;
    let servings = row.number_or(2, 1.0);
    let input = RecipeInput {
        name: row.required(0, "name")?,
        category: row.text(1),
        servings: if servings >= 1.0 { servings as u32 } else { 1 },
        total_weight_override: Some(row.number_or(3, 0.0)).filter(|w| *w > 0.0),
        ingredient_lines: ingredient_list(repository, row.cell(4)),
    };
    Ok(repository.upsert_recipe(input)?)
}

fn import_product(repository: &mut Repository, row: Row<'_>) -> Result<Upserted, RowError> {
    row.expect_columns(1)?;
    let input = ProductInput {
        name: row.required(0, "name")?,
        category: row.text(1),
        selling_price: row.number_or(2, 0.0),
        recipe_lines: vec![],
        packaging_lines: vec![],
    };
    Ok(repository.upsert_product(input)?)
}

fn import_packaging(repository: &mut Repository, row: Row<'_>) -> Result<Upserted, RowError> {
    row.expect_columns(3)?;
    let input = PackagingInput {
        name: row.required(0, "name")?,
        category: row.text(1),
        cost: row.number(2, "cost")?,
        note: row.text(3),
    };
    Ok(repository.upsert_packaging(input)?)
}

fn import_nutrition(repository: &mut Repository, row: Row<'_>) -> Result<Upserted, RowError> {
    row.expect_columns(2)?;
    let mut values = [0.0; 8];
    values[0] = row.number(1, "calories")?;
    for (i, value) in values.iter_mut().enumerate().skip(1) {
        *value = row.number_or(i + 1, 0.0);
    }
    let input = NutritionInput {
        ingredient_name: row.required(0, "ingredient")?,
        per_100g: Nutrients::from_values(values),
    };
    Ok(repository.upsert_nutrition(input)?)
}

/// Works through the data rows of one spreadsheet, one row per call to `import_one`.
pub struct SpreadsheetImporter {
    kind: EntityKind,
    rows: Vec<GridRow>,
    position: usize,
    report: ImportReport,
}

impl SpreadsheetImporter {
    /// `rows` includes the header row, which is skipped.
    pub fn new(kind: EntityKind, mut rows: Vec<GridRow>) -> Result<Self, ImportError> {
        if kind.is_derived() {
            return Err(ImportError::Unsupported(kind));
        }
        if rows.len() < 2 {
            return Err(ImportError::TooFewRows);
        }
        rows.remove(0);
        Ok(Self {
            kind,
            rows,
            position: 0,
            report: ImportReport::default(),
        })
    }

    pub fn from_path(kind: EntityKind, path: impl AsRef<Path>) -> Result<Self, ImportError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ImportError::Io {
            path: path.into(),
            source,
        })?;
        let rows = grid::decode(&bytes, grid::delimiter_for(path))?;
        Self::new(kind, rows)
    }

    pub fn done(&self) -> bool {
        self.position >= self.rows.len()
    }

    pub fn percent_done(&self) -> f32 {
        self.position as f32 / self.rows.len() as f32
    }

    pub fn report(&self) -> ImportReport {
        self.report
    }

    pub fn import_one(&mut self, repository: &mut Repository) {
        assert!(!self.done());

        let GridRow { line, cells } = &self.rows[self.position];
        self.position += 1;

        let row = Row { cells };
        let result = match self.kind {
            EntityKind::Ingredients => import_ingredient(repository, row),
            EntityKind::Recipes => import_recipe(repository, row),
            EntityKind::Products => import_product(repository, row),
            EntityKind::Packaging => import_packaging(repository, row),
            EntityKind::Nutrition => import_nutrition(repository, row),
            EntityKind::RecipeNutrition => unreachable!(),
        };
        match result {
            Ok(upserted) => {
                log::debug!("line {line}: {upserted:?}");
                self.report.succeeded += 1;
            }
            Err(error) => {
                log::warn!("line {line}: skipped {} row: {error}", self.kind);
                self.report.failed += 1;
            }
        }
    }
}

pub fn import_path(
    repository: &mut Repository,
    kind: EntityKind,
    path: impl AsRef<Path>,
) -> Result<ImportReport, ImportError> {
    let mut importer = SpreadsheetImporter::from_path(kind, path)?;
    while !importer.done() {
        importer.import_one(repository);
        log::debug!("imported {:.0}%", importer.percent_done() * 100.0);
    }

    let report = importer.report();
    log::info!(
        "imported {kind}: {} succeeded, {} failed",
        report.succeeded,
        report.failed
    );
    Ok(report)
}

#[cfg(test)]
fn rows(text: &str) -> Vec<GridRow> {
    grid::decode(text.as_bytes(), b',').unwrap()
}

#[cfg(test)]
fn import_text(repository: &mut Repository, kind: EntityKind, text: &str) -> ImportReport {
    let mut importer = SpreadsheetImporter::new(kind, rows(text)).unwrap();
    while !importer.done() {
        importer.import_one(repository);
    }
    importer.report()
}

#[test]
fn ingredient_rows_upsert_by_name() {
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();
    let flour = repository.ingredient_by_name("麵粉").unwrap().id;

    let report = import_text(
        &mut repository,
        EntityKind::Ingredients,
        "原料名稱,原料分類,單位,單價\n麵粉,粉類,公斤,40\n可可粉,粉類,kg,300\n",
    );
    assert_eq!(
        report,
        ImportReport {
            succeeded: 2,
            failed: 0
        }
    );
    assert_eq!(repository.ingredients().len(), 6);
    assert_eq!(repository.ingredient(flour).unwrap().price, 40.0);
    let cocoa = repository.ingredient_by_name("可可粉").unwrap();
    assert_eq!(cocoa.unit, IngredientUnit::Kilogram);
    assert_eq!(cocoa.id.0, 6);
}

#[test]
fn bad_rows_are_counted_and_skipped() {
    let mut repository = Repository::new();
    let report = import_text(
        &mut repository,
        EntityKind::Ingredients,
        "原料名稱,原料分類,單位,單價\n麵粉,粉類\n,粉類,公斤,35\n砂糖,糖類,公斤,cheap\n鹽,調味,公斤,-3\n奶油,油脂類,公斤,180\n",
    );
    assert_eq!(
        report,
        ImportReport {
            succeeded: 1,
            failed: 4
        }
    );
    assert_eq!(repository.ingredients().len(), 1);
    assert_eq!(repository.ingredients()[0].name, "奶油");
}

#[test]
fn row_errors_name_the_problem() {
    let mut repository = Repository::new();
    let short = ["麵粉".to_owned()];
    assert_eq!(
        import_ingredient(&mut repository, Row { cells: &short }),
        Err(RowError::TooFewColumns {
            expected: 3,
            found: 1
        })
    );
    let unpriced = ["麵粉", "粉類", "公斤"].map(String::from);
    assert_eq!(
        import_ingredient(&mut repository, Row { cells: &unpriced }),
        Err(RowError::NotANumber {
            field: "price",
            value: "".into()
        })
    );
}

#[test]
fn recipe_rows_parse_ingredient_lists() {
    let mut repository = Repository::new();
    repository.seed_samples_if_empty();

    let report = import_text(
        &mut repository,
        EntityKind::Recipes,
        "配方名稱,配方分類,總份量,總重量,原料及數量\n\
         海綿蛋糕,蛋糕,6,0,\"麵粉:500,雞蛋:0,抹茶粉:20,奶油:100\"\n\
         白吐司,麵包,-2,1000\n",
    );
    assert_eq!(report.succeeded, 2);

    let cake = repository.recipe_by_name("海綿蛋糕").unwrap();
    assert_eq!(cake.servings, 6);
    assert_eq!(cake.total_weight_override, None);
    assert_eq!(cake.ingredient_lines.len(), 2);
    assert_eq!(cake.ingredient_lines[0].amount_grams, 500.0);

    let bread = repository.recipe_by_name("白吐司").unwrap();
    assert_eq!(bread.servings, 1);
    assert_eq!(bread.total_weight_override, Some(1000.0));
    assert!(bread.ingredient_lines.is_empty());

    let nutrition = repository
        .recipe_nutrition()
        .iter()
        .find(|n| n.recipe_name == "海綿蛋糕")
        .unwrap();
    assert!((nutrition.totals.calories - (1820.0 + 717.0)).abs() < 1e-9);
}

#[test]
fn product_and_packaging_rows() {
    let mut repository = Repository::new();
    let report = import_text(
        &mut repository,
        EntityKind::Products,
        "商品名稱,商品類別,售價\n6吋海綿蛋糕,蛋糕,380\n白吐司\n",
    );
    assert_eq!(report.succeeded, 2);
    assert_eq!(repository.product_by_name("白吐司").unwrap().selling_price, 0.0);

    let report = import_text(
        &mut repository,
        EntityKind::Packaging,
        "包裝名稱,包裝種類,包裝成本,備註\n餅乾袋,袋子,2,透明塑膠袋\n麵包袋,袋子\n",
    );
    assert_eq!(
        report,
        ImportReport {
            succeeded: 1,
            failed: 1
        }
    );
    let bag = repository.packaging_by_name("餅乾袋").unwrap();
    assert_eq!(bag.note.as_deref(), Some("透明塑膠袋"));
}

#[test]
fn nutrition_rows_default_missing_nutrients() {
    let mut repository = Repository::new();
    let report = import_text(
        &mut repository,
        EntityKind::Nutrition,
        "原料名稱,熱量,蛋白質\n麵粉,364,10.3\n雞蛋,\n",
    );
    assert_eq!(
        report,
        ImportReport {
            succeeded: 1,
            failed: 1
        }
    );
    let fact = repository.nutrition_for_ingredient("麵粉").unwrap();
    assert_eq!(fact.per_100g.protein, 10.3);
    assert_eq!(fact.per_100g.sodium, 0.0);
}

#[test]
fn whole_file_errors() {
    assert!(matches!(
        SpreadsheetImporter::new(EntityKind::Ingredients, rows("原料名稱,原料分類,單位,單價\n")),
        Err(ImportError::TooFewRows)
    ));
    assert!(matches!(
        SpreadsheetImporter::new(EntityKind::RecipeNutrition, rows("a\nb\n")),
        Err(ImportError::Unsupported(EntityKind::RecipeNutrition))
    ));
    assert!(matches!(
        SpreadsheetImporter::from_path(EntityKind::Ingredients, "/nonexistent/原料.csv"),
        Err(ImportError::Io { .. })
    ));
}

#[test]
fn import_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("包裝清單.xls");
    std::fs::write(&path, "包裝名稱\t包裝種類\t包裝成本\t備註\n蛋糕盒 6吋\t盒子\t15\t\n").unwrap();

    let mut repository = Repository::new();
    let report = import_path(&mut repository, EntityKind::Packaging, &path).unwrap();
    assert_eq!(report.succeeded, 1);
    assert_eq!(repository.packaging()[0].cost, 15.0);
    assert_eq!(repository.packaging()[0].note, None);
}
