//! Per-model view state, owned by the session instead of process globals.
//!
//! A model's entry is created when its widget mounts and dropped when it
//! unmounts; the engine only ever sees the snapshot copied into a request.

use std::collections::HashMap;

use crate::logging::{log, obj, v_str, Domain, Level};
use crate::message::ComputeRequest;
use crate::model::{FilterClause, JoinSpec, Mode, OverrideSet, SortOrder, ViewMode};

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub sort_orders: Vec<SortOrder>,
    pub group_sort_orders: Vec<SortOrder>,
    pub filters: Vec<FilterClause>,
    pub join_spec: JoinSpec,
    pub overrides: OverrideSet,
    pub view_mode: ViewMode,
    pub mode: Mode,
    pub page: usize,
    pub page_size: usize,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            sort_orders: Vec::new(),
            group_sort_orders: Vec::new(),
            filters: Vec::new(),
            join_spec: JoinSpec::default(),
            overrides: OverrideSet::default(),
            view_mode: ViewMode::default(),
            mode: Mode::Read,
            page: 0,
            page_size: page_size.max(1),
        }
    }

    /// Force-show a column, or clear the force-show if already set.
    /// Force-show and force-hide are mutually exclusive per column.
    pub fn toggle_force_show(&mut self, key: &str) {
        if !self.overrides.force_show.remove(key) {
            self.overrides.force_hide.remove(key);
            self.overrides.force_show.insert(key.to_string());
        }
    }

    pub fn toggle_force_hide(&mut self, key: &str) {
        if !self.overrides.force_hide.remove(key) {
            self.overrides.force_show.remove(key);
            self.overrides.force_hide.insert(key.to_string());
        }
    }

    pub fn toggle_show_less(&mut self, key: &str) {
        if !self.overrides.show_less.remove(key) {
            self.overrides.show_less.insert(key.to_string());
        }
    }

    pub fn set_sort_orders(&mut self, orders: Vec<SortOrder>) {
        self.sort_orders = orders;
        self.page = 0;
    }

    pub fn set_filters(&mut self, filters: Vec<FilterClause>) {
        self.filters = filters;
        self.page = 0;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page;
    }

    /// Zero is ignored.
    pub fn set_page_size(&mut self, page_size: usize) {
        if page_size > 0 {
            self.page_size = page_size;
            self.page = 0;
        }
    }

    /// Copy this view into a request.
    pub fn apply_to(&self, req: &mut ComputeRequest) {
        req.sort_orders = self.sort_orders.clone();
        req.group_sort_orders = self.group_sort_orders.clone();
        req.filters = self.filters.clone();
        req.join_spec = self.join_spec.clone();
        req.overrides = self.overrides.clone();
        req.view_mode = self.view_mode;
        req.mode = self.mode;
        req.page = self.page;
        req.page_size = self.page_size;
    }
}

#[derive(Debug, Default)]
pub struct ViewRegistry {
    default_page_size: usize,
    views: HashMap<String, ViewState>,
}

impl ViewRegistry {
    pub fn new(default_page_size: usize) -> Self {
        Self { default_page_size, views: HashMap::new() }
    }

    /// Returns the model's view, creating it on first mount.
    pub fn mount(&mut self, model: &str) -> &mut ViewState {
        let page_size = self.default_page_size;
        self.views.entry(model.to_string()).or_insert_with(|| {
            log(Level::Debug, Domain::View, "mount", obj(&[("widget", v_str(model))]));
            ViewState::new(page_size)
        })
    }

    pub fn unmount(&mut self, model: &str) -> Option<ViewState> {
        let removed = self.views.remove(model);
        if removed.is_some() {
            log(Level::Debug, Domain::View, "unmount", obj(&[("widget", v_str(model))]));
        }
        removed
    }

    pub fn get(&self, model: &str) -> Option<&ViewState> {
        self.views.get(model)
    }

    pub fn get_mut(&mut self, model: &str) -> Option<&mut ViewState> {
        self.views.get_mut(model)
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mount_is_idempotent_and_isolated() {
        let mut reg = ViewRegistry::new(10);
        reg.mount("orders").set_page(3);
        assert_eq!(reg.mount("orders").page, 3);
        assert_eq!(reg.mount("alerts").page, 0);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn test_unmount_disposes_state() {
        let mut reg = ViewRegistry::new(10);
        reg.mount("orders").toggle_force_show("px");
        assert!(reg.unmount("orders").is_some());
        assert!(reg.get("orders").is_none());
        assert!(reg.mount("orders").overrides.force_show.is_empty());
        assert!(reg.unmount("missing").is_none());
    }

    #[test]
    fn test_force_toggles_are_exclusive() {
        let mut view = ViewState::new(10);
        view.toggle_force_hide("px");
        view.toggle_force_show("px");
        assert!(view.overrides.force_show.contains("px"));
        assert!(!view.overrides.force_hide.contains("px"));
        view.toggle_force_show("px");
        assert!(view.overrides.force_show.is_empty());
    }

    #[test]
    fn test_sort_and_filter_reset_page() {
        let mut view = ViewState::new(10);
        view.set_page(4);
        view.set_sort_orders(vec![SortOrder::asc("px")]);
        assert_eq!(view.page, 0);
        view.set_page(2);
        view.set_filters(vec![FilterClause::new("side", "BUY")]);
        assert_eq!(view.page, 0);
        view.set_page_size(0);
        assert_eq!(view.page_size, 10);
    }

    #[test]
    fn test_apply_to_request() {
        let mut view = ViewState::new(5);
        view.toggle_show_less("notes");
        view.set_page(1);
        let mut req = ComputeRequest::new(Vec::new(), Vec::new());
        view.apply_to(&mut req);
        assert_eq!(req.page, 1);
        assert_eq!(req.page_size, 5);
        assert!(req.overrides.show_less.contains("notes"));
    }
}
