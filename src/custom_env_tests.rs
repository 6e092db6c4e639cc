// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `custom_env.rs`

#[cfg(test)]
mod tests {
    use crate::binding_errors::BindingError;
    use crate::crd::CustomEnvVar;
    use crate::custom_env::*;
    use serde_json::{json, Value};

    fn context() -> Value {
        let service = json!({
            "metadata": {"name": "db-demo"},
            "status": {
                "dbConnectionIP": "10.0.0.5",
                "dbConnectionPort": 5432,
                "dbName": "db-demo",
                "tags": ["a", "b"]
            }
        });
        json!({
            "v1alpha1": {
                "postgresql.example.dev": {"Database": {"db-demo": service.clone()}},
                "postgresql_example_dev": {"Database": {"db_demo": service.clone()}}
            },
            "db": service
        })
    }

    fn render(template: &str) -> String {
        CustomEnvEngine::new().render(template, &context()).unwrap()
    }

    #[test]
    fn test_go_style_field_chain() {
        assert_eq!(
            render("jdbc:postgresql://{{ .db.status.dbConnectionIP }}:{{ .db.status.dbConnectionPort }}/{{ .db.status.dbName }}"),
            "jdbc:postgresql://10.0.0.5:5432/db-demo"
        );
    }

    #[test]
    fn test_sanitized_path() {
        assert_eq!(
            render("{{ .v1alpha1.postgresql_example_dev.Database.db_demo.status.dbName }}"),
            "db-demo"
        );
    }

    #[test]
    fn test_go_style_index() {
        assert_eq!(
            render(r#"{{ index . "v1alpha1" "postgresql.example.dev" "Database" "db-demo" "status" "dbConnectionIP" }}"#),
            "10.0.0.5"
        );
        assert_eq!(render(r#"{{ index .db.status "dbName" }}"#), "db-demo");
    }

    #[test]
    fn test_native_syntax_still_works() {
        assert_eq!(render("{{ db.status.dbName | upper }}"), "DB-DEMO");
        assert_eq!(render(r#"{{ index(db, "status", "dbName") }}"#), "db-demo");
    }

    #[test]
    fn test_undefined_renders_empty() {
        assert_eq!(render("[{{ .db.status.missing }}]"), "[]");
        assert_eq!(render("[{{ .nothing.at.all }}]"), "[]");
        assert_eq!(render(r#"[{{ index . "nothing" "here" }}]"#), "[]");
    }

    #[test]
    fn test_json_filter() {
        assert_eq!(render("{{ .db.status.tags | json }}"), r#"["a","b"]"#);
    }

    #[test]
    fn test_quoted_dots_are_preserved() {
        assert_eq!(render(r#"{{ "a.b" }}-{{ '.c' }}"#), "a.b-.c");
    }

    #[test]
    fn test_whitespace_control() {
        assert_eq!(render("x  {{- .db.status.dbName -}}  y"), "xdb-demoy");
    }

    #[test]
    fn test_plain_text() {
        assert_eq!(render("no templates here"), "no templates here");
    }

    #[test]
    fn test_render_custom_env_vars() {
        let vars = vec![
            CustomEnvVar {
                name: "JDBC_URL".to_string(),
                value: "jdbc:postgresql://{{ .db.status.dbConnectionIP }}".to_string(),
            },
            CustomEnvVar {
                name: "lower_case_kept".to_string(),
                value: "static".to_string(),
            },
        ];
        let rendered = render_custom_env_vars(&vars, &context()).unwrap();
        assert_eq!(rendered["JDBC_URL"], "jdbc:postgresql://10.0.0.5");
        assert_eq!(rendered["lower_case_kept"], "static");
    }

    #[test]
    fn test_syntax_error_names_variable() {
        let vars = vec![CustomEnvVar {
            name: "BROKEN".to_string(),
            value: "{{ .db.status.dbName | }}".to_string(),
        }];
        let err = render_custom_env_vars(&vars, &context()).unwrap_err();
        assert!(matches!(err, BindingError::Template { ref name, .. } if name == "BROKEN"));
    }
}
