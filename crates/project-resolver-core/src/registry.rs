//! The project registry aggregate and its review workflow.
//!
//! [`Registry`] holds the canonical projects, the category list, the
//! pending-review queue, and the rejection list. It is persisted as one
//! document: callers load it, run one operation, and write the whole thing
//! back. Every operation either succeeds completely or returns a
//! [`RegistryError`] with the aggregate unchanged.
//!
//! # Membership invariant
//!
//! A (case-insensitive, trimmed) name belongs to at most one of:
//! a project's name or aliases, a project-level pending entry, or the
//! rejected list. Operations that add a name to one set either fail or
//! drop the older membership in the other two.
//!
//! # Review workflow
//!
//! ```text
//!            approve ──▶ Project
//! pending ── merge   ──▶ alias of an existing Project
//!            reject  ──▶ rejected ── unreject ──▶ (gone)
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::RegistryError;
use crate::models::{
    normalize, PendingMention, Project, ProjectStatus, SubItem, DEFAULT_CATEGORY,
};

/// Categories of a freshly initialised registry.
pub const DEFAULT_CATEGORIES: &[&str] = &["Business Systems", "AI", "Website", "Operations", "Other"];

/// The registry document.
///
/// `Default` is the empty registry that a document with missing keys
/// deserializes to; [`Registry::new`] adds the default categories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    projects: Vec<Project>,
    #[serde(default)]
    categories: Vec<String>,
    #[serde(default)]
    pending_projects: Vec<PendingMention>,
    #[serde(default)]
    rejected: Vec<String>,
}

/// Partial update applied by [`Registry::update_project`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectUpdate {
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<ProjectStatus>,
    pub aliases: Option<Vec<String>>,
    pub sub_items: Option<Vec<SubItem>>,
}

/// Partial update applied by [`Registry::update_sub_item`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubItemUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

/// A repeat-or-new sighting of a mention classified as a new project.
#[derive(Debug, Clone, PartialEq)]
pub struct Sighting {
    pub name: String,
    pub source_text: String,
    pub confidence: f64,
    pub suggested_category: String,
    pub date: NaiveDate,
}

/// What [`Registry::record_sighting`] did with a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SightingOutcome {
    /// A new pending entry was created.
    Created,
    /// An existing pending entry's count grew.
    Repeated,
    /// The name is a project or rejected; nothing changed.
    Skipped,
}

impl Registry {
    /// An empty registry with the default category list.
    pub fn new() -> Self {
        Self {
            categories: DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect(),
            ..Self::default()
        }
    }

    // ─── Queries ───────────────────────────────────────────────────────

    /// All projects in registry order.
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn active_projects(&self) -> impl Iterator<Item = &Project> {
        self.projects.iter().filter(|p| p.is_active())
    }

    /// Look up a project by its exact canonical name.
    pub fn project(&self, name: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.name == name)
    }

    /// The project (active or archived) whose name or alias equals `text`.
    pub fn owner_of(&self, text: &str) -> Option<&Project> {
        self.projects.iter().find(|p| p.answers_to(text))
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    /// The whole review queue, project and sub-item suggestions alike.
    pub fn pending(&self) -> &[PendingMention] {
        &self.pending_projects
    }

    /// The project-level pending entry for `name`, if any.
    pub fn pending_entry(&self, name: &str) -> Option<&PendingMention> {
        self.pending_index(name).map(|i| &self.pending_projects[i])
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn is_rejected(&self, text: &str) -> bool {
        let key = normalize(text);
        self.rejected.iter().any(|r| normalize(r) == key)
    }

    // ─── Project administration ────────────────────────────────────────

    /// Add a new project.
    ///
    /// Fails if the name or any alias is already used by another project.
    /// Any pending or rejected entry for those names is dropped.
    pub fn create_project(&mut self, mut project: Project) -> Result<(), RegistryError> {
        project.name = project.name.trim().to_string();
        if project.name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if let Some(owner) = self.owner_of(&project.name) {
            return Err(RegistryError::NameTaken {
                name: project.name.clone(),
                owner: owner.name.clone(),
            });
        }
        project.aliases = self.validated_aliases(&project.name, &project.aliases, None)?;
        check_sub_items(&project.name, &project.sub_items)?;

        let keys: Vec<String> = project.keys().map(str::to_string).collect();
        for key in &keys {
            self.clear_membership(key);
        }
        self.ensure_category(&project.category);
        info!(project = %project.name, "project created");
        self.projects.push(project);
        Ok(())
    }

    /// Apply a partial update. Validation happens before anything changes.
    pub fn update_project(
        &mut self,
        name: &str,
        update: ProjectUpdate,
    ) -> Result<&Project, RegistryError> {
        let index = self.project_index(name)?;
        let canonical = self.projects[index].name.clone();

        let aliases = match &update.aliases {
            Some(aliases) => Some(self.validated_aliases(&canonical, aliases, Some(&canonical))?),
            None => None,
        };
        if let Some(sub_items) = &update.sub_items {
            check_sub_items(&canonical, sub_items)?;
        }
        let category = match update.category.as_deref().map(str::trim) {
            Some("") => return Err(RegistryError::EmptyName),
            other => other.map(str::to_string),
        };

        if let Some(aliases) = aliases {
            for alias in &aliases {
                self.clear_membership(alias);
            }
            self.projects[index].aliases = aliases;
        }
        if let Some(category) = category {
            self.ensure_category(&category);
            self.projects[index].category = category;
        }
        let project = &mut self.projects[index];
        if let Some(description) = update.description {
            project.description = description;
        }
        if let Some(status) = update.status {
            project.status = status;
        }
        if let Some(sub_items) = update.sub_items {
            project.sub_items = sub_items;
        }
        Ok(&self.projects[index])
    }

    pub fn rename_project(&mut self, old_name: &str, new_name: &str) -> Result<(), RegistryError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let index = self.project_index(old_name)?;
        if let Some(owner) = self.owner_of(new_name) {
            if owner.name != old_name {
                return Err(RegistryError::NameTaken {
                    name: new_name.to_string(),
                    owner: owner.name.clone(),
                });
            }
        }

        self.clear_membership(new_name);
        let key = normalize(new_name);
        let project = &mut self.projects[index];
        project.aliases.retain(|a| normalize(a) != key);
        project.name = new_name.to_string();

        let old_key = normalize(old_name);
        for entry in &mut self.pending_projects {
            if entry.parent_project.as_deref().is_some_and(|p| normalize(p) == old_key) {
                entry.parent_project = Some(new_name.to_string());
            }
        }
        info!(from = old_name, to = new_name, "project renamed");
        Ok(())
    }

    /// Remove a project together with its pending sub-item suggestions.
    pub fn delete_project(&mut self, name: &str) -> Result<Project, RegistryError> {
        let index = self.project_index(name)?;
        let before = self.pending_projects.len();
        let key = normalize(name);
        self.pending_projects.retain(|p| {
            !p.parent_project
                .as_deref()
                .is_some_and(|parent| normalize(parent) == key)
        });
        info!(
            project = name,
            dropped_suggestions = before - self.pending_projects.len(),
            "project deleted"
        );
        Ok(self.projects.remove(index))
    }

    /// Bind `alias` to `project`. Returns `false` if it was already bound.
    pub fn add_alias(&mut self, project: &str, alias: &str) -> Result<bool, RegistryError> {
        let alias = alias.trim();
        if alias.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let index = self.project_index(project)?;
        if self.projects[index].answers_to(alias) {
            return Ok(false);
        }
        if let Some(owner) = self.owner_of(alias) {
            return Err(RegistryError::AliasTaken {
                alias: alias.to_string(),
                owner: owner.name.clone(),
            });
        }
        self.clear_membership(alias);
        self.projects[index].aliases.push(alias.to_string());
        Ok(true)
    }

    pub fn add_sub_item(
        &mut self,
        project: &str,
        name: &str,
        description: &str,
    ) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let index = self.project_index(project)?;
        let parent = &mut self.projects[index];
        if parent.sub_item(name).is_some() {
            return Err(RegistryError::DuplicateSubItem {
                project: parent.name.clone(),
                name: name.to_string(),
            });
        }
        parent.sub_items.push(SubItem::new(name, description));
        Ok(())
    }

    pub fn remove_sub_item(&mut self, project: &str, name: &str) -> Result<SubItem, RegistryError> {
        let index = self.project_index(project)?;
        let parent = &mut self.projects[index];
        let position = parent
            .sub_item_position(name)
            .ok_or_else(|| RegistryError::SubItemNotFound {
                project: parent.name.clone(),
                name: name.to_string(),
            })?;
        Ok(parent.sub_items.remove(position))
    }

    pub fn update_sub_item(
        &mut self,
        project: &str,
        name: &str,
        update: SubItemUpdate,
    ) -> Result<(), RegistryError> {
        let index = self.project_index(project)?;
        let parent = &mut self.projects[index];
        let position = parent
            .sub_item_position(name)
            .ok_or_else(|| RegistryError::SubItemNotFound {
                project: parent.name.clone(),
                name: name.to_string(),
            })?;

        if let Some(new_name) = update.name.as_deref().map(str::trim) {
            if new_name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            let taken = parent
                .sub_item_position(new_name)
                .is_some_and(|other| other != position);
            if taken {
                return Err(RegistryError::DuplicateSubItem {
                    project: parent.name.clone(),
                    name: new_name.to_string(),
                });
            }
            parent.sub_items[position].name = new_name.to_string();
        }
        if let Some(description) = update.description {
            parent.sub_items[position].description = description;
        }
        Ok(())
    }

    pub fn add_category(&mut self, category: &str) -> Result<(), RegistryError> {
        let category = category.trim();
        if category.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.categories.iter().any(|c| c == category) {
            return Err(RegistryError::CategoryExists(category.to_string()));
        }
        self.categories.push(category.to_string());
        Ok(())
    }

    pub fn remove_category(&mut self, category: &str) -> Result<(), RegistryError> {
        let before = self.categories.len();
        self.categories.retain(|c| c != category);
        if self.categories.len() == before {
            return Err(RegistryError::CategoryNotFound(category.to_string()));
        }
        Ok(())
    }

    // ─── Review workflow ───────────────────────────────────────────────

    /// Promote a pending mention to a new active project.
    ///
    /// `category` falls back to the entry's suggested category.
    pub fn approve(&mut self, name: &str, category: Option<&str>) -> Result<(), RegistryError> {
        let index = self
            .pending_index(name)
            .ok_or_else(|| RegistryError::PendingNotFound(name.to_string()))?;
        let pending_name = self.pending_projects[index].name.clone();
        if let Some(owner) = self.owner_of(&pending_name) {
            return Err(RegistryError::NameTaken {
                name: pending_name,
                owner: owner.name.clone(),
            });
        }

        let entry = self.pending_projects.remove(index);
        let category = category
            .map(str::to_string)
            .unwrap_or(entry.suggested_category);
        self.ensure_category(&category);
        info!(project = %entry.name, %category, "pending mention approved");
        self.projects.push(Project::new(entry.name, category));
        Ok(())
    }

    /// Fold a pending mention into an existing project as an alias.
    pub fn merge(&mut self, pending_name: &str, target: &str) -> Result<(), RegistryError> {
        let index = self
            .pending_index(pending_name)
            .ok_or_else(|| RegistryError::PendingNotFound(pending_name.to_string()))?;
        let target_index = self.project_index(target)?;
        let alias = self.pending_projects[index].name.clone();

        if !self.projects[target_index].answers_to(&alias) {
            if let Some(owner) = self.owner_of(&alias) {
                return Err(RegistryError::AliasTaken {
                    alias,
                    owner: owner.name.clone(),
                });
            }
            self.projects[target_index].aliases.push(alias.clone());
        }
        self.pending_projects.remove(index);
        info!(alias = %alias, project = target, "pending mention merged");
        Ok(())
    }

    /// Move a pending mention to the rejected list.
    ///
    /// Only pending names can be rejected; a second call fails and leaves
    /// the single rejected entry in place.
    pub fn reject(&mut self, name: &str) -> Result<(), RegistryError> {
        let index = self
            .pending_index(name)
            .ok_or_else(|| RegistryError::PendingNotFound(name.to_string()))?;
        let entry = self.pending_projects.remove(index);
        if !self.is_rejected(&entry.name) {
            self.rejected.push(entry.name.clone());
        }
        info!(name = %entry.name, "pending mention rejected");
        Ok(())
    }

    /// Remove `name` from the rejected list so it may surface again.
    pub fn unreject(&mut self, name: &str) -> Result<(), RegistryError> {
        let key = normalize(name);
        let before = self.rejected.len();
        self.rejected.retain(|r| normalize(r) != key);
        if self.rejected.len() == before {
            return Err(RegistryError::NotRejected(name.to_string()));
        }
        Ok(())
    }

    /// Append a pending sub-item suggestion to its parent project.
    pub fn approve_sub_item(&mut self, parent: &str, name: &str) -> Result<(), RegistryError> {
        let index = self
            .sub_item_pending_index(parent, name)
            .ok_or_else(|| RegistryError::PendingNotFound(format!("{parent}/{name}")))?;
        let entry = &self.pending_projects[index];
        let parent_name = entry.parent_project.clone().unwrap_or_default();
        let sub_name = entry.name.clone();

        self.add_sub_item(&parent_name, &sub_name, "")?;
        self.pending_projects.remove(index);
        info!(project = %parent_name, sub_item = %sub_name, "sub-item suggestion approved");
        Ok(())
    }

    /// Drop a pending sub-item suggestion. Sub-item names never enter the
    /// rejected list.
    pub fn reject_sub_item(&mut self, parent: &str, name: &str) -> Result<(), RegistryError> {
        let index = self
            .sub_item_pending_index(parent, name)
            .ok_or_else(|| RegistryError::PendingNotFound(format!("{parent}/{name}")))?;
        self.pending_projects.remove(index);
        Ok(())
    }

    // ─── End-user suggestions ──────────────────────────────────────────

    /// Queue a user-proposed project for review.
    pub fn suggest_project(
        &mut self,
        name: &str,
        suggested_by: Option<&str>,
        today: NaiveDate,
    ) -> Result<(), RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if let Some(owner) = self.owner_of(name) {
            return Err(RegistryError::NameTaken {
                name: name.to_string(),
                owner: owner.name.clone(),
            });
        }
        if self.pending_index(name).is_some() {
            return Err(RegistryError::AlreadyPending(name.to_string()));
        }
        if self.is_rejected(name) {
            return Err(RegistryError::Rejected(name.to_string()));
        }

        self.pending_projects.push(PendingMention {
            name: name.to_string(),
            first_seen: today,
            mention_count: 1,
            source_texts: vec![name.to_string()],
            suggested_category: DEFAULT_CATEGORY.to_string(),
            confidence: 1.0,
            parent_project: None,
            suggested_by: suggested_by.map(str::to_string),
        });
        Ok(())
    }

    /// Queue a user-proposed sub-item of an existing project for review.
    pub fn suggest_sub_item(
        &mut self,
        parent: &str,
        name: &str,
        suggested_by: Option<&str>,
        today: NaiveDate,
    ) -> Result<(), RegistryError> {
        let (parent, name) = (parent.trim(), name.trim());
        if parent.is_empty() || name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let project = self
            .owner_of(parent)
            .ok_or_else(|| RegistryError::ProjectNotFound(parent.to_string()))?;
        let key = normalize(name);
        if project.sub_items.iter().any(|s| normalize(&s.name) == key) {
            return Err(RegistryError::DuplicateSubItem {
                project: project.name.clone(),
                name: name.to_string(),
            });
        }
        let parent_name = project.name.clone();
        let category = project.category.clone();
        if self.sub_item_pending_index(&parent_name, name).is_some() {
            return Err(RegistryError::AlreadyPending(format!("{parent_name}/{name}")));
        }

        self.pending_projects.push(PendingMention {
            name: name.to_string(),
            first_seen: today,
            mention_count: 1,
            source_texts: vec![name.to_string()],
            suggested_category: category,
            confidence: 1.0,
            parent_project: Some(parent_name),
            suggested_by: suggested_by.map(str::to_string),
        });
        Ok(())
    }

    // ─── Cascade bookkeeping ───────────────────────────────────────────

    /// Add `text` to the rejected list on behalf of the cascade.
    ///
    /// Idempotent. Names owned by a project are left alone; a pending entry
    /// with the same name is dropped. Returns `true` if the list grew.
    pub fn record_rejection(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() || self.owner_of(text).is_some() || self.is_rejected(text) {
            return false;
        }
        if let Some(index) = self.pending_index(text) {
            self.pending_projects.remove(index);
        }
        self.rejected.push(text.to_string());
        true
    }

    /// Create a pending entry for a new-project sighting, or bump the
    /// existing one.
    pub fn record_sighting(&mut self, sighting: Sighting) -> SightingOutcome {
        let name = sighting.name.trim();
        if name.is_empty() || self.owner_of(name).is_some() || self.is_rejected(name) {
            return SightingOutcome::Skipped;
        }
        if let Some(index) = self.pending_index(name) {
            let entry = &mut self.pending_projects[index];
            entry.mention_count += 1;
            entry.source_texts.push(sighting.source_text);
            return SightingOutcome::Repeated;
        }
        self.pending_projects.push(PendingMention {
            name: name.to_string(),
            first_seen: sighting.date,
            mention_count: 1,
            source_texts: vec![sighting.source_text],
            suggested_category: sighting.suggested_category,
            confidence: sighting.confidence,
            parent_project: None,
            suggested_by: None,
        });
        SightingOutcome::Created
    }

    // ─── Internals ─────────────────────────────────────────────────────

    fn project_index(&self, name: &str) -> Result<usize, RegistryError> {
        self.projects
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RegistryError::ProjectNotFound(name.to_string()))
    }

    fn pending_index(&self, name: &str) -> Option<usize> {
        let key = normalize(name);
        self.pending_projects
            .iter()
            .position(|p| !p.is_sub_item() && normalize(&p.name) == key)
    }

    fn sub_item_pending_index(&self, parent: &str, name: &str) -> Option<usize> {
        let (parent, name) = (normalize(parent), normalize(name));
        self.pending_projects.iter().position(|p| {
            p.parent_project.as_deref().map(normalize).as_deref() == Some(parent.as_str())
                && normalize(&p.name) == name
        })
    }

    /// Drop any project-level pending entry and rejected entry for `name`.
    fn clear_membership(&mut self, name: &str) {
        let key = normalize(name);
        self.pending_projects
            .retain(|p| p.is_sub_item() || normalize(&p.name) != key);
        self.rejected.retain(|r| normalize(r) != key);
    }

    fn ensure_category(&mut self, category: &str) {
        if !category.is_empty() && !self.categories.iter().any(|c| c == category) {
            self.categories.push(category.to_string());
        }
    }

    /// Trim, de-duplicate, and collision-check an alias list for `owner`.
    fn validated_aliases(
        &self,
        owner: &str,
        aliases: &[String],
        except: Option<&str>,
    ) -> Result<Vec<String>, RegistryError> {
        let owner_key = normalize(owner);
        let mut seen: Vec<String> = vec![owner_key];
        let mut result = Vec::with_capacity(aliases.len());
        for alias in aliases {
            let alias = alias.trim();
            let key = normalize(alias);
            if alias.is_empty() || seen.contains(&key) {
                continue;
            }
            if let Some(other) = self.owner_of(alias) {
                if Some(other.name.as_str()) != except {
                    return Err(RegistryError::AliasTaken {
                        alias: alias.to_string(),
                        owner: other.name.clone(),
                    });
                }
            }
            seen.push(key);
            result.push(alias.to_string());
        }
        Ok(result)
    }
}

fn check_sub_items(project: &str, sub_items: &[SubItem]) -> Result<(), RegistryError> {
    for (i, item) in sub_items.iter().enumerate() {
        let key = normalize(&item.name);
        if sub_items[..i].iter().any(|s| normalize(&s.name) == key) {
            return Err(RegistryError::DuplicateSubItem {
                project: project.to_string(),
                name: item.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn sighting(name: &str) -> Sighting {
        Sighting {
            name: name.to_string(),
            source_text: name.to_string(),
            confidence: 0.75,
            suggested_category: DEFAULT_CATEGORY.to_string(),
            date: today(),
        }
    }

    fn registry() -> Registry {
        let mut r = Registry::new();
        r.create_project(Project::new("Payment Gateway", "Business Systems").with_aliases(["PG"]))
            .unwrap();
        r.create_project(Project::new("Ops Dashboard", "Operations")).unwrap();
        r
    }

    /// No normalized name may sit in two of the three membership sets.
    fn assert_exclusive(r: &Registry) {
        for p in r.pending().iter().filter(|p| !p.is_sub_item()) {
            assert!(r.owner_of(&p.name).is_none(), "{} is pending and a project", p.name);
            assert!(!r.is_rejected(&p.name), "{} is pending and rejected", p.name);
        }
        for name in r.rejected() {
            assert!(r.owner_of(name).is_none(), "{} is rejected and a project", name);
        }
    }

    #[test]
    fn missing_keys_load_as_empty() {
        let r: Registry = serde_json::from_str(r#"{"projects": [{"name": "A"}]}"#).unwrap();
        assert_eq!(r.projects().len(), 1);
        assert!(r.pending().is_empty());
        assert!(r.rejected().is_empty());
        assert!(r.categories().is_empty());
    }

    #[test]
    fn create_rejects_duplicate_name_and_alias() {
        let mut r = registry();
        let err = r.create_project(Project::new("payment gateway", "Other")).unwrap_err();
        assert!(matches!(err, RegistryError::NameTaken { .. }));

        let err = r
            .create_project(Project::new("Portal", "Other").with_aliases(["pg"]))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::AliasTaken {
                alias: "pg".into(),
                owner: "Payment Gateway".into()
            }
        );
        assert_eq!(r.projects().len(), 2);
    }

    #[test]
    fn create_clears_pending_and_rejected() {
        let mut r = registry();
        r.record_sighting(sighting("Inventory Sync"));
        r.suggest_project("Billing", None, today()).unwrap();
        r.reject("Billing").unwrap();

        r.create_project(Project::new("Inventory Sync", "Other").with_aliases(["billing"]))
            .unwrap();
        assert!(r.pending_entry("Inventory Sync").is_none());
        assert!(!r.is_rejected("Billing"));
        assert_exclusive(&r);
    }

    #[test]
    fn approve_creates_active_project() {
        let mut r = registry();
        r.record_sighting(sighting("Inventory Sync v2"));
        r.approve("Inventory Sync v2", Some("Internal Tools")).unwrap();

        let p = r.project("Inventory Sync v2").unwrap();
        assert!(p.is_active());
        assert!(p.aliases.is_empty());
        assert_eq!(p.category, "Internal Tools");
        assert!(r.categories().iter().any(|c| c == "Internal Tools"));
        assert!(r.pending().is_empty());
    }

    #[test]
    fn reject_after_approve_fails() {
        let mut r = registry();
        r.record_sighting(sighting("X"));
        r.approve("X", None).unwrap();
        assert_eq!(r.reject("X"), Err(RegistryError::PendingNotFound("X".into())));
        assert!(r.rejected().is_empty());
    }

    #[test]
    fn double_reject_leaves_one_entry() {
        let mut r = registry();
        r.record_sighting(sighting("weekly sync"));
        r.reject("weekly sync").unwrap();
        assert!(r.reject("weekly sync").is_err());
        assert_eq!(r.rejected(), &["weekly sync".to_string()]);
    }

    #[test]
    fn merge_adds_alias_once() {
        let mut r = registry();
        r.record_sighting(sighting("Pay GW"));
        r.merge("Pay GW", "Payment Gateway").unwrap();
        assert_eq!(r.project("Payment Gateway").unwrap().aliases, vec!["PG", "Pay GW"]);
        assert!(r.pending().is_empty());
    }

    #[test]
    fn merge_requires_both_sides() {
        let mut r = registry();
        assert_eq!(
            r.merge("nope", "Payment Gateway"),
            Err(RegistryError::PendingNotFound("nope".into()))
        );
        r.record_sighting(sighting("Pay GW"));
        assert_eq!(
            r.merge("Pay GW", "Nowhere"),
            Err(RegistryError::ProjectNotFound("Nowhere".into()))
        );
        assert!(r.pending_entry("Pay GW").is_some());
    }

    #[test]
    fn unreject_only_touches_rejected() {
        let mut r = registry();
        r.record_rejection("meeting");
        r.unreject("Meeting").unwrap();
        assert!(r.rejected().is_empty());
        assert!(r.pending().is_empty());
        assert_eq!(r.unreject("meeting"), Err(RegistryError::NotRejected("meeting".into())));
    }

    #[test]
    fn sightings_accumulate() {
        let mut r = registry();
        assert_eq!(r.record_sighting(sighting("Inventory Sync v2")), SightingOutcome::Created);
        assert_eq!(r.record_sighting(sighting("inventory sync v2")), SightingOutcome::Repeated);
        let entry = r.pending_entry("Inventory Sync v2").unwrap();
        assert_eq!(entry.mention_count, 2);
        assert_eq!(entry.source_texts.len(), 2);
        assert_eq!(entry.name, "Inventory Sync v2");
    }

    #[test]
    fn sighting_of_known_or_rejected_name_is_skipped() {
        let mut r = registry();
        r.record_rejection("standup");
        assert_eq!(r.record_sighting(sighting("PG")), SightingOutcome::Skipped);
        assert_eq!(r.record_sighting(sighting("Standup")), SightingOutcome::Skipped);
        assert!(r.pending().is_empty());
    }

    #[test]
    fn record_rejection_replaces_pending() {
        let mut r = registry();
        r.record_sighting(sighting("all-hands"));
        assert!(r.record_rejection("All-Hands"));
        assert!(!r.record_rejection("all-hands"));
        assert!(!r.record_rejection("PG"));
        assert!(r.pending().is_empty());
        assert_eq!(r.rejected().len(), 1);
        assert_exclusive(&r);
    }

    #[test]
    fn rename_checks_collisions() {
        let mut r = registry();
        assert!(matches!(
            r.rename_project("Ops Dashboard", "PG"),
            Err(RegistryError::NameTaken { .. })
        ));
        r.rename_project("Payment Gateway", "PG").unwrap();
        let p = r.project("PG").unwrap();
        assert!(p.aliases.is_empty());
    }

    #[test]
    fn rename_carries_sub_item_suggestions() {
        let mut r = registry();
        r.suggest_sub_item("PG", "Refunds", None, today()).unwrap();
        r.rename_project("Payment Gateway", "Payments Core").unwrap();
        assert_eq!(r.pending()[0].parent_project.as_deref(), Some("Payments Core"));

        r.approve_sub_item("Payments Core", "Refunds").unwrap();
        assert!(r.project("Payments Core").unwrap().sub_item("Refunds").is_some());
        assert!(r.pending().is_empty());
    }

    #[test]
    fn delete_drops_sub_item_suggestions() {
        let mut r = registry();
        r.suggest_sub_item("Payment Gateway", "Refunds", None, today()).unwrap();
        r.suggest_sub_item("Ops Dashboard", "Alerts", None, today()).unwrap();
        r.suggest_project("Data Lake", None, today()).unwrap();

        r.delete_project("Payment Gateway").unwrap();
        let names: Vec<_> = r.pending().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alerts", "Data Lake"]);

        // A new project with the old name starts without inherited suggestions.
        r.create_project(Project::new("Payment Gateway", "Business Systems")).unwrap();
        assert!(matches!(
            r.approve_sub_item("Payment Gateway", "Refunds"),
            Err(RegistryError::PendingNotFound(_))
        ));
    }

    #[test]
    fn alias_add_is_idempotent_and_exclusive() {
        let mut r = registry();
        assert!(r.add_alias("Payment Gateway", "Gateway").unwrap());
        assert!(!r.add_alias("Payment Gateway", "gateway").unwrap());
        assert!(matches!(
            r.add_alias("Ops Dashboard", "Gateway"),
            Err(RegistryError::AliasTaken { .. })
        ));
    }

    #[test]
    fn update_validates_before_writing() {
        let mut r = registry();
        let update = ProjectUpdate {
            description: Some("changed".into()),
            aliases: Some(vec!["PG".into()]),
            ..Default::default()
        };
        assert!(r.update_project("Ops Dashboard", update).is_err());
        assert_eq!(r.project("Ops Dashboard").unwrap().description, "");

        let update = ProjectUpdate {
            status: Some(ProjectStatus::Archived),
            aliases: Some(vec![" OD ".into(), "od".into()]),
            ..Default::default()
        };
        let p = r.update_project("Ops Dashboard", update).unwrap();
        assert_eq!(p.aliases, vec!["OD"]);
        assert!(!p.is_active());
    }

    #[test]
    fn update_rejects_blank_category() {
        let mut r = registry();
        let before = r.clone();
        for category in ["", "   "] {
            let update = ProjectUpdate {
                description: Some("changed".into()),
                category: Some(category.into()),
                ..Default::default()
            };
            assert_eq!(
                r.update_project("Ops Dashboard", update).unwrap_err(),
                RegistryError::EmptyName
            );
        }
        assert_eq!(r, before);

        let update = ProjectUpdate {
            category: Some(" Research ".into()),
            ..Default::default()
        };
        assert_eq!(r.update_project("Ops Dashboard", update).unwrap().category, "Research");
        assert!(r.categories().iter().any(|c| c == "Research"));
    }

    #[test]
    fn sub_item_lifecycle() {
        let mut r = registry();
        r.add_sub_item("Payment Gateway", "Refunds", "").unwrap();
        assert!(matches!(
            r.add_sub_item("Payment Gateway", "Refunds", ""),
            Err(RegistryError::DuplicateSubItem { .. })
        ));
        r.update_sub_item(
            "Payment Gateway",
            "Refunds",
            SubItemUpdate {
                name: Some("Refund flow".into()),
                description: Some("partial refunds".into()),
            },
        )
        .unwrap();
        let removed = r.remove_sub_item("Payment Gateway", "Refund flow").unwrap();
        assert_eq!(removed.description, "partial refunds");
    }

    #[test]
    fn sub_item_names_ignore_case() {
        let mut r = registry();
        r.add_sub_item("Payment Gateway", "Refunds", "").unwrap();
        assert!(matches!(
            r.add_sub_item("Payment Gateway", "refunds", ""),
            Err(RegistryError::DuplicateSubItem { .. })
        ));
        r.add_sub_item("Payment Gateway", "Chargebacks", "").unwrap();
        assert!(matches!(
            r.update_sub_item(
                "Payment Gateway",
                "chargebacks",
                SubItemUpdate {
                    name: Some("REFUNDS".into()),
                    ..Default::default()
                },
            ),
            Err(RegistryError::DuplicateSubItem { .. })
        ));

        // Changing only the case of its own name is allowed.
        r.update_sub_item(
            "Payment Gateway",
            "refunds",
            SubItemUpdate {
                name: Some("REFUNDS".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let p = r.project("Payment Gateway").unwrap();
        assert_eq!(p.sub_items[0].name, "REFUNDS");
        assert_eq!(p.sub_items.len(), 2);

        let update = ProjectUpdate {
            sub_items: Some(vec![SubItem::new("Ledger", ""), SubItem::new("ledger ", "")]),
            ..Default::default()
        };
        assert!(matches!(
            r.update_project("Payment Gateway", update),
            Err(RegistryError::DuplicateSubItem { .. })
        ));
        assert_eq!(r.remove_sub_item("Payment Gateway", "refunds").unwrap().name, "REFUNDS");
    }

    #[test]
    fn suggestions_respect_membership() {
        let mut r = registry();
        assert!(matches!(
            r.suggest_project("pg", None, today()),
            Err(RegistryError::NameTaken { .. })
        ));
        r.suggest_project("Data Lake", Some("alice"), today()).unwrap();
        assert_eq!(
            r.suggest_project("data lake", None, today()),
            Err(RegistryError::AlreadyPending("data lake".into()))
        );
        r.record_rejection("lunch");
        assert_eq!(
            r.suggest_project("Lunch", None, today()),
            Err(RegistryError::Rejected("Lunch".into()))
        );
        assert_eq!(r.pending_entry("Data Lake").unwrap().suggested_by.as_deref(), Some("alice"));
    }

    #[test]
    fn sub_item_suggestion_flow() {
        let mut r = registry();
        r.suggest_sub_item("Payment Gateway", "Refunds", None, today()).unwrap();
        assert!(matches!(
            r.suggest_sub_item("Payment Gateway", "refunds", None, today()),
            Err(RegistryError::AlreadyPending(_))
        ));
        // Sub-item suggestions do not count as project-level pending names.
        assert!(r.pending_entry("Refunds").is_none());

        r.approve_sub_item("Payment Gateway", "Refunds").unwrap();
        assert!(r.project("Payment Gateway").unwrap().sub_item("Refunds").is_some());
        assert!(r.pending().is_empty());
        assert!(matches!(
            r.suggest_sub_item("Payment Gateway", "REFUNDS", None, today()),
            Err(RegistryError::DuplicateSubItem { .. })
        ));
    }

    #[test]
    fn categories_fail_explicitly() {
        let mut r = Registry::new();
        assert_eq!(r.add_category("AI"), Err(RegistryError::CategoryExists("AI".into())));
        r.add_category("Internal Tools").unwrap();
        r.remove_category("Internal Tools").unwrap();
        assert_eq!(
            r.remove_category("Internal Tools"),
            Err(RegistryError::CategoryNotFound("Internal Tools".into()))
        );
    }
}
