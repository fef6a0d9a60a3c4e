use super::{Runtime, Template};
use crate::compiler::Trigger;
use crate::events::GameEvent;
use crate::runtime_log::LogKind;
use crate::stage::Lineage;
use anyhow::{anyhow, bail, Context, Result};
use std::rc::Rc;

/// Separator between an original id and the clone serial in generated ids.
pub const CLONE_SEPARATOR: &str = "__clone_";

impl Runtime {
    /// Snapshots an original entity's current spawn state and catalog. Clones are
    /// made from this record even after the original is gone.
    pub fn save_template(&mut self, id: &str) -> Result<()> {
        let entity = self.stage.entity(id).with_context(|| format!("cannot save template: no entity '{id}'"))?;
        if self.stage.is_clone(entity) {
            bail!("cannot save template for clone '{id}'");
        }
        let mut spawn = self.stage.spawn_spec(entity).with_context(|| format!("entity '{id}' has no transform"))?;
        spawn.lineage = None;
        let catalog = self.catalogs.get(id).cloned().unwrap_or_default();
        self.templates.insert(id.to_string(), Rc::new(Template { spawn, catalog }));
        Ok(())
    }

    pub fn template(&self, id: &str) -> Option<&Rc<Template>> {
        self.templates.get(id)
    }

    /// The template-bearing original behind `source`: the lineage of a live clone,
    /// else the prefix of a generated clone id, else `source` itself.
    pub fn resolve_original(&self, source: &str) -> String {
        if let Some(entity) = self.stage.entity(source) {
            if let Some(lineage) = self.stage.world.get::<Lineage>(entity) {
                return lineage.original.clone();
            }
            return source.to_string();
        }
        match source.split_once(CLONE_SEPARATOR) {
            Some((original, _)) if !original.is_empty() => original.to_string(),
            _ => source.to_string(),
        }
    }

    pub fn live_clone_count(&self) -> usize {
        self.stage.entities_in_order().filter(|&entity| self.stage.is_clone(entity)).count()
    }

    /// Spawns a clone of `source`'s original. While running, the clone's start
    /// behaviors run right away; forevers follow the global activation flag.
    /// Every rejection is logged as an error.
    pub fn clone_entity(&mut self, source: &str) -> Result<String> {
        self.spawn_clone(source).map_err(|err| {
            self.log_error(format!("{err:#}"));
            err
        })
    }

    fn spawn_clone(&mut self, source: &str) -> Result<String> {
        let original = self.resolve_original(source);
        let template = self
            .templates
            .get(&original)
            .cloned()
            .ok_or_else(|| anyhow!("cannot clone '{source}': no template for '{original}'"))?;
        let live_clones = self.live_clone_count();
        if live_clones >= self.config.clone_limit {
            self.events.push(GameEvent::CloneRejected { original: original.clone(), live_clones });
            bail!(
                "clone of '{original}' rejected: {live_clones} clones already live (limit {})",
                self.config.clone_limit
            );
        }

        self.clone_serial += 1;
        let id = format!("{original}{CLONE_SEPARATOR}{}", self.clone_serial);
        let mut spawn = template.spawn.clone();
        spawn.id = id.clone();
        spawn.lineage = Some(original.clone());
        let live_original = self.stage.entity(&original);
        if let Some(current) = live_original.and_then(|entity| self.stage.spawn_spec(entity)) {
            spawn.position = current.position;
            spawn.rotation = current.rotation;
            spawn.scale = current.scale;
            spawn.costume = current.costume;
            spawn.visible = current.visible;
            spawn.depth = current.depth;
        }
        self.stage.spawn(&spawn).with_context(|| format!("cannot clone '{source}'"))?;
        self.catalogs.insert(id.clone(), template.catalog.clone());
        if live_original.is_some() {
            self.variables.copy_locals(&original, &id);
        } else {
            self.variables.register_entity(&id);
        }
        self.events.push(GameEvent::CloneSpawned { id: id.clone(), original: original.clone() });
        self.push_log(LogKind::Action, format!("clone {id} created from {original}"));

        if self.is_running() {
            self.pending_clone_starts.push_back(id.clone());
            if self.clone_depth == 0 {
                self.run_clone_starts();
            }
        }
        Ok(id)
    }

    /// Drains queued clone starts iteratively so clones spawning clones do not nest.
    fn run_clone_starts(&mut self) {
        self.clone_depth += 1;
        while let Some(id) = self.pending_clone_starts.pop_front() {
            let starts = match self.catalogs.get(&id) {
                Some(catalog) => catalog.matching(|trigger| matches!(trigger, Trigger::Start | Trigger::CloneStart)),
                None => continue,
            };
            for behavior in starts {
                self.launch(&id, &behavior);
            }
        }
        self.clone_depth -= 1;
    }

    /// Removes a live entity with its catalog and locals. Its template, if any, stays.
    pub fn delete_entity(&mut self, id: &str) -> bool {
        if !self.stage.despawn(id) {
            return false;
        }
        self.catalogs.remove(id);
        self.variables.remove_entity(id);
        self.events.push(GameEvent::EntityDeleted { id: id.to_string() });
        self.push_log(LogKind::Action, format!("{id} deleted"));
        true
    }

    /// Re-parents `child` under `parent`, keeping its on-screen placement.
    pub fn attach_to(&mut self, child: &str, parent: &str) -> Result<()> {
        let child_entity = self.stage.entity(child).with_context(|| format!("attach: no entity '{child}'"))?;
        let parent_entity = self.stage.entity(parent).with_context(|| format!("attach: no entity '{parent}'"))?;
        self.stage.attach(child_entity, parent_entity).with_context(|| format!("attach {child} to {parent}"))?;
        self.push_log(LogKind::Action, format!("{child} attached to {parent}"));
        Ok(())
    }

    pub fn detach(&mut self, child: &str) -> bool {
        let detached = self.stage.entity(child).is_some_and(|entity| self.stage.detach(entity));
        if detached {
            self.push_log(LogKind::Action, format!("{child} detached"));
        }
        detached
    }
}
