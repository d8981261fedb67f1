//! The host display-graph contract.
//!
//! The VM never owns display objects; it addresses them through opaque
//! [`DisplayHandle`]s handed out by the host and queries them through the
//! [`DisplayGraph`] trait. Timeline opcodes (`Play`, `GotoFrame`, …) and
//! the magic `_x`/`_y`/… properties all bottom out here.

use crate::avm1::ObjectId;
use std::cell::Cell;
use std::rc::Rc;

/// Opaque identifier of one display-graph node.
///
/// The generation changes when a slot is reused so stale handles never
/// alias a new node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DisplayHandle {
    pub index: u32,
    pub generation: u32,
}

/// A soft reference to a display node.
///
/// ActionScript may hold a "movieclip" value past the node's unload. The
/// reference keeps the node's original target path and re-resolves it
/// against the live graph on every dereference, yielding nothing while no
/// node exists at that path.
#[derive(Clone, Debug)]
pub struct DisplayRef {
    path: Rc<str>,
    handle: Cell<Option<DisplayHandle>>,
}

impl DisplayRef {
    pub fn new(path: Rc<str>, handle: DisplayHandle) -> Self {
        Self {
            path,
            handle: Cell::new(Some(handle)),
        }
    }

    /// The original target path this reference was created with.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Resolve against the live graph, rebinding by path if the cached
    /// handle went stale.
    pub fn resolve(&self, graph: &dyn DisplayGraph) -> Option<DisplayHandle> {
        if let Some(handle) = self.handle.get() {
            if !graph.is_removed(handle) {
                return Some(handle);
            }
            self.handle.set(None);
        }
        let rebound = graph.find_by_path(&self.path);
        if let Some(handle) = rebound {
            self.handle.set(Some(handle));
        }
        rebound
    }

    /// The current target path: the live node's path, or the original one
    /// while the node is gone.
    pub fn target_path(&self, graph: &dyn DisplayGraph) -> Rc<str> {
        match self.resolve(graph) {
            Some(handle) => graph.path(handle).into(),
            None => Rc::clone(&self.path),
        }
    }
}

/// Display refs compare by node identity when both sides are live;
/// a dangling ref only equals another ref to the same original path.
impl PartialEq for DisplayRef {
    fn eq(&self, other: &Self) -> bool {
        match (self.handle.get(), other.handle.get()) {
            (Some(a), Some(b)) => a == b,
            _ => self.path == other.path,
        }
    }
}

/// Host-implemented view of the display graph.
///
/// Only the queries the VM actually issues are present; anything the host
/// cannot honor may fall back to the provided defaults, which report
/// nothing and log under `unimpl` where silence would be misleading.
pub trait DisplayGraph {
    /// The absolute root, `_level0`.
    fn root(&self) -> DisplayHandle;

    /// Look up a loaded level, 0..=65535.
    fn level(&self, depth: i32) -> Option<DisplayHandle>;

    /// Resolve an absolute dot-path (as produced by [`path`](Self::path)).
    fn find_by_path(&self, path: &str) -> Option<DisplayHandle>;

    /// A named child of `parent`.
    fn child_by_name(
        &self,
        parent: DisplayHandle,
        name: &str,
        case_sensitive: bool,
    ) -> Option<DisplayHandle>;

    fn parent(&self, handle: DisplayHandle) -> Option<DisplayHandle>;

    fn name(&self, handle: DisplayHandle) -> String;

    fn set_name(&mut self, _handle: DisplayHandle, _name: &str) {}

    /// Absolute dot-path of a node, e.g. `_level0.hero.arm`.
    fn path(&self, handle: DisplayHandle) -> String;

    /// Whether the node has been removed from the graph.
    fn is_removed(&self, handle: DisplayHandle) -> bool;

    /// Whether the node is a sprite (only those report `"movieclip"` from
    /// `typeof`).
    fn is_movie_clip(&self, handle: DisplayHandle) -> bool;

    /// The scripted object bound to this node, if one was created.
    fn scripted_object(&self, handle: DisplayHandle) -> Option<ObjectId>;

    /// Walk every live node's scripted object; these are GC roots.
    fn visit_scripted_objects(&self, visitor: &mut dyn FnMut(ObjectId));

    // Geometry and state queried by the magic properties. Units are
    // pixels and degrees, matching what scripts observe.

    fn x(&self, _handle: DisplayHandle) -> f64 {
        0.0
    }
    fn set_x(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn y(&self, _handle: DisplayHandle) -> f64 {
        0.0
    }
    fn set_y(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn x_scale(&self, _handle: DisplayHandle) -> f64 {
        100.0
    }
    fn set_x_scale(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn y_scale(&self, _handle: DisplayHandle) -> f64 {
        100.0
    }
    fn set_y_scale(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn rotation(&self, _handle: DisplayHandle) -> f64 {
        0.0
    }
    fn set_rotation(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn width(&self, _handle: DisplayHandle) -> f64 {
        0.0
    }
    fn set_width(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn height(&self, _handle: DisplayHandle) -> f64 {
        0.0
    }
    fn set_height(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn alpha(&self, _handle: DisplayHandle) -> f64 {
        100.0
    }
    fn set_alpha(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn visible(&self, _handle: DisplayHandle) -> bool {
        true
    }
    fn set_visible(&mut self, _handle: DisplayHandle, _value: bool) {}
    fn current_frame(&self, _handle: DisplayHandle) -> u16 {
        1
    }
    fn total_frames(&self, _handle: DisplayHandle) -> u16 {
        1
    }
    fn frames_loaded(&self, _handle: DisplayHandle) -> u16 {
        1
    }
    /// Whether a given 1-based frame has finished loading.
    fn frame_loaded(&self, handle: DisplayHandle, frame: u16) -> bool {
        frame <= self.frames_loaded(handle)
    }
    fn drop_target(&self, _handle: DisplayHandle) -> String {
        String::new()
    }
    fn url(&self, _handle: DisplayHandle) -> String {
        String::new()
    }
    fn quality(&self) -> &'static str {
        "HIGH"
    }
    fn set_quality(&mut self, _value: &str) {}
    fn focus_rect(&self, _handle: DisplayHandle) -> bool {
        true
    }
    fn set_focus_rect(&mut self, _handle: DisplayHandle, _value: bool) {}
    fn sound_buf_time(&self, _handle: DisplayHandle) -> f64 {
        5.0
    }
    fn set_sound_buf_time(&mut self, _handle: DisplayHandle, _value: f64) {}
    fn lock_root(&self, _handle: DisplayHandle) -> bool {
        false
    }
    fn set_lock_root(&mut self, _handle: DisplayHandle, _value: bool) {}
    /// Mouse position in the node's coordinate space.
    fn mouse_position(&self, _handle: DisplayHandle) -> (f64, f64) {
        (0.0, 0.0)
    }

    // Timeline commands issued by the interpreter.

    fn play(&mut self, _handle: DisplayHandle) {}
    fn stop(&mut self, _handle: DisplayHandle) {}
    fn goto_frame(&mut self, _handle: DisplayHandle, _frame: u16, _stop: bool) {}
    /// Returns false when the label does not exist on the timeline.
    fn goto_label(&mut self, _handle: DisplayHandle, _label: &str, _stop: bool) -> bool {
        false
    }
    fn next_frame(&mut self, _handle: DisplayHandle) {}
    fn prev_frame(&mut self, _handle: DisplayHandle) {}
    fn toggle_quality(&mut self) {}
    fn stop_sounds(&mut self) {}
    fn clone_sprite(&mut self, _source: DisplayHandle, _name: &str, _depth: i32) {
        log_unimpl!("CloneSprite is not supported by this host");
    }
    fn remove_sprite(&mut self, _handle: DisplayHandle) {
        log_unimpl!("RemoveSprite is not supported by this host");
    }
    fn start_drag(
        &mut self,
        _handle: DisplayHandle,
        _lock_center: bool,
        _constraint: Option<(f64, f64, f64, f64)>,
    ) {
        log_unimpl!("StartDrag is not supported by this host");
    }
    fn end_drag(&mut self) {}
}

/// A display graph with a single empty root. Useful for hosts that run
/// scripts without a stage, and as a placeholder in tools.
#[derive(Default)]
pub struct NullDisplayGraph;

impl DisplayGraph for NullDisplayGraph {
    fn root(&self) -> DisplayHandle {
        DisplayHandle {
            index: 0,
            generation: 0,
        }
    }

    fn level(&self, depth: i32) -> Option<DisplayHandle> {
        if depth == 0 {
            Some(self.root())
        } else {
            None
        }
    }

    fn find_by_path(&self, path: &str) -> Option<DisplayHandle> {
        if path == "_level0" {
            Some(self.root())
        } else {
            None
        }
    }

    fn child_by_name(
        &self,
        _parent: DisplayHandle,
        _name: &str,
        _case_sensitive: bool,
    ) -> Option<DisplayHandle> {
        None
    }

    fn parent(&self, _handle: DisplayHandle) -> Option<DisplayHandle> {
        None
    }

    fn name(&self, _handle: DisplayHandle) -> String {
        String::new()
    }

    fn path(&self, _handle: DisplayHandle) -> String {
        "_level0".to_string()
    }

    fn is_removed(&self, _handle: DisplayHandle) -> bool {
        false
    }

    fn is_movie_clip(&self, _handle: DisplayHandle) -> bool {
        true
    }

    fn scripted_object(&self, _handle: DisplayHandle) -> Option<ObjectId> {
        None
    }

    fn visit_scripted_objects(&self, _visitor: &mut dyn FnMut(ObjectId)) {}
}
