//! Dialect-aware predicate algebra
//!
//! All listing predicates are rendered here, in one place, for both SQL
//! backends. SQLite reads JSON fields with `json_extract` and relies on its
//! ASCII-case-insensitive `LIKE`; PostgreSQL uses the arrow operators and
//! `ILIKE`. Values are always bound as parameters, never interpolated.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

/// A value bound into a rendered query, in render order.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlArg {
    Text(String),
    Real(f64),
    Int(i64),
}

/// Fixed columns filterable by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixedField {
    Type,
    Alias,
    Workspace,
    ParentId,
    CreatedBy,
}

impl FixedField {
    pub fn column(&self) -> &'static str {
        match self {
            FixedField::Type => "type",
            FixedField::Alias => "alias",
            FixedField::Workspace => "workspace",
            FixedField::ParentId => "parent_id",
            FixedField::CreatedBy => "created_by",
        }
    }
}

/// Numeric columns filterable by scalar (>=) or `[lo, hi]` range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeField {
    CreatedAt,
    LastModified,
    DownloadCount,
    ViewCount,
}

impl RangeField {
    pub fn column(&self) -> &'static str {
        match self {
            RangeField::CreatedAt => "created_at",
            RangeField::LastModified => "last_modified",
            RangeField::DownloadCount => "download_count",
            RangeField::ViewCount => "view_count",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    FieldEq(FixedField, String),
    RangeGe(RangeField, f64),
    RangeBetween(RangeField, Option<f64>, Option<f64>),
    /// Equality on a top-level manifest key.
    ManifestEq { key: String, value: String },
    /// Case-insensitive pattern match on a top-level manifest key;
    /// `pattern` already uses SQL `%` wildcards.
    ManifestLike { key: String, pattern: String },
    /// Equality on `config.permissions.<user>`.
    PermissionEq { user_id: String, value: String },
    /// Case-insensitive keyword match over the whole manifest text;
    /// `pattern` already carries surrounding `%`.
    KeywordLike(String),
}

struct Binder<'a> {
    dialect: Dialect,
    args: &'a mut Vec<SqlArg>,
}

impl Binder<'_> {
    fn push(&mut self, arg: SqlArg) -> String {
        self.args.push(arg);
        match self.dialect {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", self.args.len()),
        }
    }
}

/// JSON path for SQLite's `json_extract`, quoting each key.
fn json_path(keys: &[&str]) -> String {
    let mut path = String::from("$");
    for key in keys {
        path.push_str(&format!(".\"{}\"", key));
    }
    path
}

impl Predicate {
    fn render(&self, binder: &mut Binder<'_>) -> String {
        match self {
            Predicate::FieldEq(field, value) => {
                let p = binder.push(SqlArg::Text(value.clone()));
                format!("{} = {}", field.column(), p)
            }
            Predicate::RangeGe(field, value) => {
                let p = binder.push(SqlArg::Real(*value));
                format!("{} >= {}", field.column(), p)
            }
            Predicate::RangeBetween(field, lo, hi) => {
                let mut parts = Vec::new();
                if let Some(lo) = lo {
                    let p = binder.push(SqlArg::Real(*lo));
                    parts.push(format!("{} >= {}", field.column(), p));
                }
                if let Some(hi) = hi {
                    let p = binder.push(SqlArg::Real(*hi));
                    parts.push(format!("{} <= {}", field.column(), p));
                }
                if parts.is_empty() {
                    "1 = 1".to_string()
                } else {
                    format!("({})", parts.join(" AND "))
                }
            }
            Predicate::ManifestEq { key, value } => match binder.dialect {
                Dialect::Sqlite => {
                    let path = binder.push(SqlArg::Text(json_path(&[key])));
                    let v = binder.push(SqlArg::Text(value.clone()));
                    format!("json_extract(manifest, {}) = {}", path, v)
                }
                Dialect::Postgres => {
                    let k = binder.push(SqlArg::Text(key.clone()));
                    let v = binder.push(SqlArg::Text(value.clone()));
                    format!("manifest->>{}::text = {}", k, v)
                }
            },
            Predicate::ManifestLike { key, pattern } => match binder.dialect {
                Dialect::Sqlite => {
                    let path = binder.push(SqlArg::Text(json_path(&[key])));
                    let v = binder.push(SqlArg::Text(pattern.clone()));
                    format!("json_extract(manifest, {}) LIKE {}", path, v)
                }
                Dialect::Postgres => {
                    let k = binder.push(SqlArg::Text(key.clone()));
                    let v = binder.push(SqlArg::Text(pattern.clone()));
                    format!("manifest->>{}::text ILIKE {}", k, v)
                }
            },
            Predicate::PermissionEq { user_id, value } => match binder.dialect {
                Dialect::Sqlite => {
                    let path = binder.push(SqlArg::Text(json_path(&["permissions", user_id])));
                    let v = binder.push(SqlArg::Text(value.clone()));
                    format!("json_extract(config, {}) = {}", path, v)
                }
                Dialect::Postgres => {
                    let k = binder.push(SqlArg::Text(user_id.clone()));
                    let v = binder.push(SqlArg::Text(value.clone()));
                    format!("config->'permissions'->>{}::text = {}", k, v)
                }
            },
            Predicate::KeywordLike(pattern) => match binder.dialect {
                Dialect::Sqlite => {
                    let v = binder.push(SqlArg::Text(pattern.clone()));
                    format!("manifest LIKE {}", v)
                }
                Dialect::Postgres => {
                    let v = binder.push(SqlArg::Text(pattern.clone()));
                    format!("manifest::text ILIKE {}", v)
                }
            },
        }
    }
}

/// Which rows a listing targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// Immediate children of a parent artifact id.
    Children(String),
    /// Top-level artifacts of a workspace.
    TopLevel(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    And,
    Or,
}

impl FilterMode {
    pub fn parse(mode: &str) -> Option<FilterMode> {
        match mode {
            "AND" => Some(FilterMode::And),
            "OR" => Some(FilterMode::Or),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderField {
    Id,
    ViewCount,
    DownloadCount,
    LastModified,
    CreatedAt,
}

impl OrderField {
    pub fn column(&self) -> &'static str {
        match self {
            OrderField::Id => "id",
            OrderField::ViewCount => "view_count",
            OrderField::DownloadCount => "download_count",
            OrderField::LastModified => "last_modified",
            OrderField::CreatedAt => "created_at",
        }
    }

    pub fn parse(name: &str) -> Option<OrderField> {
        match name {
            "id" => Some(OrderField::Id),
            "view_count" => Some(OrderField::ViewCount),
            "download_count" => Some(OrderField::DownloadCount),
            "last_modified" => Some(OrderField::LastModified),
            "created_at" => Some(OrderField::CreatedAt),
            _ => None,
        }
    }
}

/// A fully planned child listing, ready to render for either dialect.
#[derive(Debug, Clone)]
pub struct ListPlan {
    pub scope: Scope,
    /// Restrict to staged (true) or committed-only (false) rows.
    pub stage: bool,
    pub conditions: Vec<Predicate>,
    pub mode: FilterMode,
    pub order: (OrderField, bool),
    pub offset: i64,
    pub limit: i64,
}

impl ListPlan {
    fn render_scope(&self, binder: &mut Binder<'_>) -> String {
        match &self.scope {
            Scope::Children(parent_id) => {
                let p = binder.push(SqlArg::Text(parent_id.clone()));
                format!("parent_id = {}", p)
            }
            Scope::TopLevel(workspace) => {
                let p = binder.push(SqlArg::Text(workspace.clone()));
                format!("(parent_id IS NULL AND workspace = {})", p)
            }
        }
    }

    fn render_stage(&self, dialect: Dialect) -> &'static str {
        match (dialect, self.stage) {
            (Dialect::Sqlite, true) => "(staging IS NOT NULL AND staging != 'null')",
            (Dialect::Sqlite, false) => "(staging IS NULL OR staging = 'null')",
            (Dialect::Postgres, true) => "(staging IS NOT NULL AND staging::text != 'null')",
            (Dialect::Postgres, false) => "(staging IS NULL OR staging::text = 'null')",
        }
    }

    /// Render the WHERE clause shared by the listing and its COUNT.
    pub fn render_where(&self, dialect: Dialect) -> (String, Vec<SqlArg>) {
        let mut args = Vec::new();
        let mut binder = Binder {
            dialect,
            args: &mut args,
        };

        let mut clause = self.render_scope(&mut binder);
        clause.push_str(" AND ");
        clause.push_str(self.render_stage(dialect));

        if !self.conditions.is_empty() {
            let joiner = match self.mode {
                FilterMode::And => " AND ",
                FilterMode::Or => " OR ",
            };
            let rendered: Vec<String> = self
                .conditions
                .iter()
                .map(|c| c.render(&mut binder))
                .collect();
            clause.push_str(&format!(" AND ({})", rendered.join(joiner)));
        }

        (clause, args)
    }

    /// Render the full tail of the SELECT: WHERE, ORDER BY, LIMIT, OFFSET.
    pub fn render_select(&self, dialect: Dialect) -> (String, Vec<SqlArg>) {
        let (mut clause, mut args) = self.render_where(dialect);
        let (field, ascending) = self.order;
        clause.push_str(&format!(
            " ORDER BY {} {}",
            field.column(),
            if ascending { "ASC" } else { "DESC" }
        ));
        {
            let mut binder = Binder {
                dialect,
                args: &mut args,
            };
            let limit = binder.push(SqlArg::Int(self.limit));
            let offset = binder.push(SqlArg::Int(self.offset));
            clause.push_str(&format!(" LIMIT {} OFFSET {}", limit, offset));
        }
        (clause, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_plan() -> ListPlan {
        ListPlan {
            scope: Scope::Children("pid".into()),
            stage: false,
            conditions: vec![],
            mode: FilterMode::And,
            order: (OrderField::Id, true),
            offset: 0,
            limit: 100,
        }
    }

    #[test]
    fn test_render_scope_and_stage() {
        let plan = base_plan();
        let (sql, args) = plan.render_where(Dialect::Sqlite);
        assert_eq!(sql, "parent_id = ? AND (staging IS NULL OR staging = 'null')");
        assert_eq!(args, vec![SqlArg::Text("pid".into())]);

        let (sql, _) = plan.render_where(Dialect::Postgres);
        assert_eq!(
            sql,
            "parent_id = $1 AND (staging IS NULL OR staging::text = 'null')"
        );
    }

    #[test]
    fn test_render_stage_true() {
        let mut plan = base_plan();
        plan.stage = true;
        let (sql, _) = plan.render_where(Dialect::Sqlite);
        assert!(sql.contains("staging IS NOT NULL AND staging != 'null'"));
    }

    #[test]
    fn test_render_top_level_scope() {
        let mut plan = base_plan();
        plan.scope = Scope::TopLevel("ws-a".into());
        let (sql, args) = plan.render_where(Dialect::Sqlite);
        assert!(sql.starts_with("(parent_id IS NULL AND workspace = ?)"));
        assert_eq!(args[0], SqlArg::Text("ws-a".into()));
    }

    #[test]
    fn test_render_manifest_predicates() {
        let mut plan = base_plan();
        plan.conditions = vec![
            Predicate::ManifestEq {
                key: "tag".into(),
                value: "red".into(),
            },
            Predicate::ManifestLike {
                key: "tag".into(),
                pattern: "red%".into(),
            },
        ];
        let (sql, args) = plan.render_where(Dialect::Sqlite);
        assert!(sql.contains("json_extract(manifest, ?) = ?"));
        assert!(sql.contains("json_extract(manifest, ?) LIKE ?"));
        assert!(args.contains(&SqlArg::Text("$.\"tag\"".into())));
        assert!(args.contains(&SqlArg::Text("red%".into())));

        let (sql, _) = plan.render_where(Dialect::Postgres);
        assert!(sql.contains("manifest->>$2::text = $3"));
        assert!(sql.contains("manifest->>$4::text ILIKE $5"));
    }

    #[test]
    fn test_render_or_mode() {
        let mut plan = base_plan();
        plan.mode = FilterMode::Or;
        plan.conditions = vec![
            Predicate::KeywordLike("%red%".into()),
            Predicate::KeywordLike("%blue%".into()),
        ];
        let (sql, _) = plan.render_where(Dialect::Sqlite);
        // Keyword conditions combine under OR; stage stays AND-combined.
        assert!(sql.contains("AND (manifest LIKE ? OR manifest LIKE ?)"));
    }

    #[test]
    fn test_render_permission_predicate() {
        let mut plan = base_plan();
        plan.conditions = vec![Predicate::PermissionEq {
            user_id: "alice".into(),
            value: "r".into(),
        }];
        let (sql, args) = plan.render_where(Dialect::Sqlite);
        assert!(sql.contains("json_extract(config, ?) = ?"));
        assert!(args.contains(&SqlArg::Text("$.\"permissions\".\"alice\"".into())));

        let (sql, _) = plan.render_where(Dialect::Postgres);
        assert!(sql.contains("config->'permissions'->>$2::text = $3"));
    }

    #[test]
    fn test_render_range_predicates() {
        let mut plan = base_plan();
        plan.conditions = vec![
            Predicate::RangeGe(RangeField::ViewCount, 5.0),
            Predicate::RangeBetween(RangeField::CreatedAt, Some(10.0), None),
            Predicate::RangeBetween(RangeField::LastModified, Some(1.0), Some(2.0)),
        ];
        let (sql, args) = plan.render_where(Dialect::Sqlite);
        assert!(sql.contains("view_count >= ?"));
        assert!(sql.contains("(created_at >= ?)"));
        assert!(sql.contains("(last_modified >= ? AND last_modified <= ?)"));
        assert_eq!(args.len(), 5); // scope + 4 range bounds
    }

    #[test]
    fn test_render_select_orders_and_paginates() {
        let mut plan = base_plan();
        plan.order = (OrderField::ViewCount, false);
        plan.offset = 20;
        plan.limit = 10;
        let (sql, args) = plan.render_select(Dialect::Postgres);
        assert!(sql.contains("ORDER BY view_count DESC"));
        assert!(sql.ends_with("LIMIT $2 OFFSET $3"));
        assert_eq!(args[1], SqlArg::Int(10));
        assert_eq!(args[2], SqlArg::Int(20));
    }
}
