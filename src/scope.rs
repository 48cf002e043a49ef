use crate::db::{CursorKind, Database, ScopeRecord};
use crate::discord::DM_SCOPE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Guild,
    DirectMessages,
}

/// One scan target with the cursor it resumes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub id: String,
    pub name: Option<String>,
    pub kind: ScopeKind,
    pub resume_cursor: Option<String>,
}

impl Scope {
    fn from_record(record: ScopeRecord, kind: CursorKind) -> Self {
        let resume_cursor = record.cursor(kind).map(str::to_string);
        let scope_kind = if record.id == DM_SCOPE {
            ScopeKind::DirectMessages
        } else {
            ScopeKind::Guild
        };
        Self {
            id: record.id,
            name: record.name,
            kind: scope_kind,
            resume_cursor,
        }
    }

    pub fn is_dm(&self) -> bool {
        self.kind == ScopeKind::DirectMessages
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Lists scan targets from the store: guild scopes in discovery order, then
/// the DM scope. A non-empty `allowlist` restricts guilds only.
pub fn enumerate_scopes(
    db: &Database,
    allowlist: &[String],
    kind: CursorKind,
) -> anyhow::Result<Vec<Scope>> {
    let records = if allowlist.is_empty() {
        db.list_scopes(None)?
    } else {
        let mut ids = allowlist.to_vec();
        ids.push(DM_SCOPE.to_string());
        db.list_scopes(Some(&ids))?
    };

    Ok(records
        .into_iter()
        .map(|record| Scope::from_record(record, kind))
        .collect())
}

/// Guild scopes only, for channel discovery.
pub fn guild_scopes(
    db: &Database,
    allowlist: &[String],
    kind: CursorKind,
) -> anyhow::Result<Vec<Scope>> {
    Ok(enumerate_scopes(db, allowlist, kind)?
        .into_iter()
        .filter(|scope| !scope.is_dm())
        .collect())
}
