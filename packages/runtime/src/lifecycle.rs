//! Tree initialization and teardown
//!
//! A walk visits elements in document order. Each element's directives are
//! sorted by priority; a directive's `inline` step runs on the spot while its
//! main handler is queued until the whole walk is done, so handlers see the
//! inline state (refs, ignore flags) of the entire subtree.

use crate::context::DirectiveContext;
use crate::diagnostics::DiagnosticKind;
use crate::directive::{parse_directive, sort_by_priority, source_binding, Directive};
use crate::nodes::Cleanups;
use crate::runtime::Tendril;
use tendril_dom::{EventTarget, NodeId};
use tracing::{debug, instrument, trace};

impl Tendril {
    /// Visit `root` and its element descendants in document order; the
    /// visitor returns false to skip an element's children
    pub(crate) fn walk(&self, root: NodeId, visit: &mut dyn FnMut(NodeId) -> bool) {
        if !visit(root) {
            return;
        }
        let mut child = self.dom().first_element_child(root);
        while let Some(node) = child {
            // Read the sibling after visiting: handlers may insert right after `node`
            self.walk(node, visit);
            child = self.dom().next_element_sibling(node);
        }
    }

    /// Nearest element, starting with `el`, accepted by `predicate`. Teleported
    /// clones continue the search from their template.
    pub(crate) fn find_closest(&self, el: NodeId, mut predicate: impl FnMut(NodeId) -> bool) -> Option<NodeId> {
        let mut current = Some(el);
        while let Some(node) = current {
            if !self.dom().is_element(node) {
                return None;
            }
            if predicate(node) {
                return Some(node);
            }
            current = self
                .nodes()
                .with(node, |state| state.teleport_back)
                .flatten()
                .or_else(|| self.dom().parent(node));
        }
        None
    }

    /// Closest element declaring a component (`data`, or `init` too when asked)
    pub fn closest_root(&self, el: NodeId, include_init: bool) -> Option<NodeId> {
        let data = self.attribute_name("data");
        let init = self.attribute_name("init");
        self.find_closest(el, |node| {
            self.dom().has_attribute(node, &data) || (include_init && self.dom().has_attribute(node, &init))
        })
    }

    fn ignored_by_ancestor(&self, el: NodeId) -> bool {
        self.dom().ancestors(el).into_iter().any(|node| self.nodes().is_ignored(node))
    }

    /// Whether mutations under `el` are outside the runtime's reach
    pub(crate) fn within_ignored(&self, el: NodeId) -> bool {
        self.nodes().is_ignored(el) || self.ignored_by_ancestor(el)
    }

    // Directive discovery

    /// Directives of `el` sorted by priority
    pub fn directives_of(&self, el: NodeId) -> Vec<Directive> {
        self.directives_from(self.dom().attributes(el))
    }

    pub(crate) fn directives_from(&self, attributes: Vec<(String, String)>) -> Vec<Directive> {
        let prefix = &self.config().prefix;
        let mut directives: Vec<Directive> = attributes
            .into_iter()
            .filter_map(|(name, value)| parse_directive(&name, source_binding(&value), prefix, None))
            .collect();
        let order = self.inner.registry.borrow().order().to_vec();
        sort_by_priority(&mut directives, &order);
        directives
    }

    /// Bind one directive to `el`: run its inline step now and its handler
    /// now or at the end of the current walk. Returns its cleanups.
    pub(crate) fn run_directive(&self, el: NodeId, directive: Directive) -> Cleanups {
        let cleanups = self.nodes().attribute_cleanups(el, &directive.original);
        let skipped = self.nodes().with(el, |state| state.ignore || state.ignore_self).unwrap_or(false);
        if skipped {
            return cleanups;
        }
        let handler = self.inner.registry.borrow().directive(&directive.kind);
        let Some(handler) = handler else {
            self.warn_missing_directive(el, &directive.kind);
            return cleanups;
        };

        trace!(kind = %directive.kind, original = %directive.original, "Binding directive");
        let cx = DirectiveContext::new(self.clone(), el, directive, cleanups.clone());
        handler.inline(&cx);
        self.defer_or_run(Box::new(move || handler.handle(&cx)));
        cleanups
    }

    fn warn_missing_directive(&self, el: NodeId, kind: &str) {
        let config = self.config();
        if config.warn_missing_plugins && config.plugin_directives.iter().any(|plugin| plugin == kind) {
            self.warn(
                DiagnosticKind::MissingPlugin,
                format!(
                    "You can't use [{}] without first installing the \"{kind}\" plugin",
                    self.attribute_name(kind)
                ),
                Some(el),
            );
        }
    }

    fn defer_or_run(&self, task: Box<dyn FnOnce()>) {
        let deferred = {
            let mut queues = self.inner.handler_queues.borrow_mut();
            match queues.last_mut() {
                Some(queue) => {
                    queue.push(task);
                    None
                }
                None => Some(task),
            }
        };
        if let Some(task) = deferred {
            task();
        }
    }

    /// Queue directive handlers bound while `f` runs, then run them in order
    pub(crate) fn defer_handlers(&self, f: impl FnOnce()) {
        self.inner.handler_queues.borrow_mut().push(Vec::new());
        f();
        let queue = self.inner.handler_queues.borrow_mut().pop().unwrap_or_default();
        for task in queue {
            task();
        }
    }

    // Trees

    /// Bind the directives of every element under `root` that is not yet
    /// initialized. Subtrees under an ignored element are skipped.
    #[instrument(level = "debug", skip(self))]
    pub fn initialize_tree(&self, root: NodeId) {
        if self.ignored_by_ancestor(root) {
            debug!("Skipping initialization inside an ignored subtree");
            return;
        }
        self.defer_handlers(|| self.walk(root, &mut |el| self.initialize_element(el)));
    }

    fn initialize_element(&self, el: NodeId) -> bool {
        if self.nodes().is_initialized(el) {
            return true;
        }
        for directive in self.directives_of(el) {
            self.run_directive(el, directive);
        }
        if self.nodes().is_ignored(el) {
            return false;
        }
        let marker = self.next_marker();
        self.nodes().update(el, |state| state.marker = Some(marker));
        true
    }

    /// Run the cleanups of every element under `root`
    #[instrument(level = "debug", skip(self))]
    pub fn destroy_tree(&self, root: NodeId) {
        self.walk(root, &mut |el| {
            self.destroy_element(el);
            true
        });
    }

    fn destroy_element(&self, el: NodeId) {
        if !self.nodes().contains(el) {
            return;
        }
        self.nodes().element_cleanups(el).run();
        for cleanups in self.nodes().take_attribute_cleanups(el, None) {
            cleanups.run();
        }
        self.nodes().update(el, |state| state.marker = None);
    }

    /// Tear down a subtree the runtime created and drop its state entirely
    pub(crate) fn discard_tree(&self, root: NodeId) {
        self.destroy_tree(root);
        let mut subtree = vec![root];
        subtree.extend(self.dom().descendants(root));
        for node in subtree {
            self.nodes().forget(node);
        }
    }

    /// Run the cleanups registered for the named attributes of `el`
    pub(crate) fn cleanup_attributes(&self, el: NodeId, names: &[String]) {
        for cleanups in self.nodes().take_attribute_cleanups(el, Some(names)) {
            cleanups.run();
        }
    }

    /// Bind directives for attributes added to an already live element
    pub(crate) fn apply_attributes(&self, el: NodeId, attributes: Vec<(String, String)>) {
        let directives = self.directives_from(attributes);
        if directives.is_empty() {
            return;
        }
        self.defer_handlers(|| {
            for directive in directives {
                self.run_directive(el, directive);
            }
        });
    }

    /// Elements that start a component and are not inside another one
    pub fn roots(&self) -> Vec<NodeId> {
        let dom = self.dom();
        let data = self.attribute_name("data");
        let init = self.attribute_name("init");
        let is_root = |node: NodeId| dom.has_attribute(node, &data) || dom.has_attribute(node, &init);
        dom.descendants(dom.document())
            .into_iter()
            .filter(|node| dom.is_element(*node) && is_root(*node))
            .filter(|node| dom.parent(*node).and_then(|parent| self.closest_root(parent, true)).is_none())
            .collect()
    }

    /// Initialize every component in the document and start reacting to
    /// mutations. Calling it twice only warns.
    #[instrument(level = "info", skip(self))]
    pub fn start(&self) {
        if self.inner.started.replace(true) {
            self.warn(
                DiagnosticKind::AlreadyStarted,
                "Tendril has already been started; calling start() more than once can cause problems",
                None,
            );
            return;
        }
        tendril_common::init_logging(&self.config().log_filter);
        self.dom().dispatch_custom(EventTarget::Document, "tendril:init", None);
        self.observe_mutations();

        let roots = self.roots();
        debug!(roots = roots.len(), "Initializing components");
        for root in roots {
            self.initialize_tree(root);
        }
        self.dom().dispatch_custom(EventTarget::Document, "tendril:initialized", None);
    }

    pub fn is_started(&self) -> bool {
        self.inner.started.get()
    }
}
