/// Select-script generation for the query builder
///
/// A builder request names one table and its selected fields; the generated
/// script is an optional preceding `LOAD` (needed for aliases) followed by the
/// `SQL SELECT ... FROM "T <db/owner>";` statement the parser accepts.
use serde::{Deserialize, Serialize};
use tracing::debug;

const NEXT_LINE: &str = "\r\n";
const TAB: &str = "    ";
const SCRIPT_SEPARATOR: &str = "\r\n\r\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptField {
    pub display_name: String,
    #[serde(default)]
    pub identifier_name: String,
    /// Empty when the field keeps its own name
    #[serde(default)]
    pub alias_name: String,
}

impl ScriptField {
    pub fn new(display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        Self {
            identifier_name: display_name.clone(),
            display_name,
            alias_name: String::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias_name = alias.into();
        self
    }

    pub fn has_alias(&self) -> bool {
        !self.alias_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectScriptRequest {
    #[serde(default)]
    pub key: String,
    /// Source folder part of the locator
    #[serde(default)]
    pub database_name: String,
    /// Store file part of the locator
    #[serde(default)]
    pub owner_name: String,
    pub table_name: String,
    #[serde(default)]
    pub include_preceding_load: bool,
    pub fields: Vec<ScriptField>,
}

impl SelectScriptRequest {
    pub fn new(
        database_name: impl Into<String>,
        owner_name: impl Into<String>,
        table_name: impl Into<String>,
        fields: Vec<ScriptField>,
    ) -> Self {
        let database_name = database_name.into();
        let owner_name = owner_name.into();
        let table_name = table_name.into();
        let key = [database_name.as_str(), owner_name.as_str(), table_name.as_str()]
            .iter()
            .filter(|part| !part.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(".");
        Self {
            key,
            database_name,
            owner_name,
            table_name,
            include_preceding_load: false,
            fields,
        }
    }

    pub fn any_alias(&self) -> bool {
        self.fields.iter().any(ScriptField::has_alias)
    }
}

/// Render the script of one table
pub fn build_select_script(request: &SelectScriptRequest) -> String {
    let separator = format!(",{}{}", NEXT_LINE, TAB);
    let mut script = String::new();

    if request.include_preceding_load {
        let load = request
            .fields
            .iter()
            .map(|field| {
                if field.has_alias() {
                    format!("\"{}\" AS \"{}\"", field.display_name, field.alias_name)
                } else {
                    format!("\"{}\"", field.display_name)
                }
            })
            .collect::<Vec<_>>()
            .join(&separator);
        script.push_str(&format!("LOAD {};{}", load, NEXT_LINE));
    }

    let select = request
        .fields
        .iter()
        .map(|field| format!("\"{}\"", field.display_name))
        .collect::<Vec<_>>()
        .join(&separator);

    script.push_str(&format!(
        "SQL SELECT {}{}FROM \"{} <{}/{}>\";",
        select, NEXT_LINE, request.table_name, request.database_name, request.owner_name
    ));
    script
}

struct ComposedScript {
    request: SelectScriptRequest,
    script: String,
}

/// Multi-table script generation with reuse.
///
/// A call with the same tables (order-insensitive) and the same preceding-load
/// flag as the previous call returns the previous script untouched. Otherwise
/// each table is regenerated only when its effective request changed.
#[derive(Default)]
pub struct ScriptComposer {
    last_tables: Vec<SelectScriptRequest>,
    last_preceding_load: Option<bool>,
    composed: Vec<ComposedScript>,
    generated: usize,
}

impl ScriptComposer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&mut self, tables: &[SelectScriptRequest], preceding_load: bool) -> String {
        let mut sorted = tables.to_vec();
        sorted.sort_by(|a, b| a.key.cmp(&b.key));

        if self.last_preceding_load == Some(preceding_load) && sorted == self.last_tables {
            return self.current_script();
        }

        let mut composed = Vec::with_capacity(tables.len());
        for table in tables {
            let mut request = table.clone();
            request.include_preceding_load = preceding_load || table.any_alias();

            let reusable = self
                .composed
                .iter()
                .position(|entry| entry.request.key == request.key && entry.request == request);
            match reusable {
                Some(index) => composed.push(self.composed.swap_remove(index)),
                None => {
                    self.generated += 1;
                    let script = build_select_script(&request);
                    composed.push(ComposedScript { request, script });
                }
            }
        }

        debug!(
            tables = composed.len(),
            preceding_load,
            generated = self.generated,
            "Composed select script"
        );

        self.composed = composed;
        self.last_tables = sorted;
        self.last_preceding_load = Some(preceding_load);
        self.current_script()
    }

    /// Scripts of the last generation, blank-line separated
    pub fn current_script(&self) -> String {
        self.composed
            .iter()
            .map(|entry| entry.script.as_str())
            .collect::<Vec<_>>()
            .join(SCRIPT_SEPARATOR)
            .trim()
            .to_string()
    }

    /// Number of single-table scripts rendered so far
    pub fn generated_count(&self) -> usize {
        self.generated
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> SelectScriptRequest {
        SelectScriptRequest::new(
            "models",
            "trnsport.sym",
            "d",
            vec![ScriptField::new("i"), ScriptField::new("j"), ScriptField::new("Value")],
        )
    }

    #[test]
    fn test_plain_select_script() {
        assert_eq!(
            build_select_script(&transport()),
            "SQL SELECT \"i\",\r\n    \"j\",\r\n    \"Value\"\r\nFROM \"d <models/trnsport.sym>\";"
        );
    }

    #[test]
    fn test_preceding_load_carries_aliases() {
        let mut request = transport();
        request.fields[2] = ScriptField::new("Value").with_alias("distance");
        request.include_preceding_load = true;
        let script = build_select_script(&request);
        assert!(script.starts_with(
            "LOAD \"i\",\r\n    \"j\",\r\n    \"Value\" AS \"distance\";\r\nSQL SELECT \"i\""
        ));
    }

    #[test]
    fn test_request_json_uses_camel_case() {
        let json = r#"{"key":"k","databaseName":"db","ownerName":"f.sym","tableName":"t",
            "includePrecedingLoad":true,"fields":[{"displayName":"a","identifierName":"a","aliasName":""}]}"#;
        let request: SelectScriptRequest = serde_json::from_str(json).unwrap();
        assert!(request.include_preceding_load);
        assert_eq!(request.fields[0].display_name, "a");
        assert_eq!(request.key, "k");
    }

    #[test]
    fn test_composer_skips_unchanged_generation() {
        let mut composer = ScriptComposer::new();
        let first = composer.generate(&[transport()], false);
        assert_eq!(composer.generated_count(), 1);

        let second = composer.generate(&[transport()], false);
        assert_eq!(first, second);
        assert_eq!(composer.generated_count(), 1);
    }

    #[test]
    fn test_composer_regenerates_when_flag_changes() {
        let mut composer = ScriptComposer::new();
        composer.generate(&[transport()], false);
        let with_load = composer.generate(&[transport()], true);
        assert!(with_load.starts_with("LOAD "));
        assert_eq!(composer.generated_count(), 2);

        // the flag is remembered: same call again is a no-op
        composer.generate(&[transport()], true);
        assert_eq!(composer.generated_count(), 2);
    }

    #[test]
    fn test_composer_reuses_unchanged_tables() {
        let mut composer = ScriptComposer::new();
        let supply = SelectScriptRequest::new("models", "trnsport.sym", "a", vec![ScriptField::new("i")]);
        composer.generate(&[transport()], false);

        let script = composer.generate(&[transport(), supply.clone()], false);
        assert_eq!(composer.generated_count(), 2);
        assert!(script.contains("\";\r\n\r\nSQL SELECT \"i\"\r\nFROM \"a <"));

        // table order does not matter for the cache
        composer.generate(&[supply, transport()], false);
        assert_eq!(composer.generated_count(), 2);
    }

    #[test]
    fn test_alias_forces_preceding_load() {
        let mut composer = ScriptComposer::new();
        let mut request = transport();
        request.fields[0] = ScriptField::new("i").with_alias("plant");
        let script = composer.generate(&[request], false);
        assert!(script.starts_with("LOAD \"i\" AS \"plant\""));
    }
}
