use rustc_hash::FxHashMap;

/// One client's baseline observations, as read from their sheet.
///
/// Baselines are keyed by canonical test name. A test without an entry was
/// not taken by this client and is skipped for them entirely.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Client {
    /// Name of the sheet the client was read from
    pub sheet_name: String,
    pub name: String,
    pub age: Option<f64>,
    pub baselines: FxHashMap<String, f64>,
}

impl Client {
    #[must_use]
    pub fn new(name: impl Into<String>, age: Option<f64>) -> Self {
        let name = name.into();
        Self {
            sheet_name: name.clone(),
            name,
            age,
            baselines: FxHashMap::default(),
        }
    }

    /// Add a baseline observation (builder style)
    #[must_use]
    pub fn with_baseline(mut self, test: impl Into<String>, value: f64) -> Self {
        self.baselines.insert(test.into(), value);
        self
    }

    #[must_use]
    pub fn baseline(&self, test: &str) -> Option<f64> {
        self.baselines.get(test).copied()
    }

    /// Output sheet label: `{name}_{age}` with the age truncated to whole
    /// years, or `{name}_` when no age is known.
    #[must_use]
    pub fn sheet_label(&self) -> String {
        match self.age {
            Some(age) => format!("{}_{}", self.name, age.trunc() as i64),
            None => format!("{}_", self.name),
        }
    }
}
