//! # Material Index
//!
//! AVL tree keyed by [`MaterialKey`], one per vertex layout. Each node owns
//! the batch accumulators of its material, at most one per primitive kind,
//! kept sorted by primitive kind.
//!
//! Nodes own their children directly (`Option<Box<_>>`), so dropping the
//! index drops the whole tree. Device buffers are not released on drop; the
//! cache manager releases them explicitly through [`MaterialIndex::clear`].
//!
//! ## Balancing
//!
//! Heights are updated bottom-up while the insertion recursion unwinds, and
//! the first unbalanced ancestor is fixed with a single or double rotation
//! toward the shorter side. Lookups never insert.

use std::cmp::Ordering;

use super::accumulator::BatchAccumulator;
use super::frame::FrameContext;
use crate::device::GraphicsDevice;
use crate::error::CacheResult;
use crate::material::MaterialKey;
use crate::vertex::{PrimitiveKind, VertexLayout};

type Link = Option<Box<MaterialNode>>;

const LEFT: usize = 0;
const RIGHT: usize = 1;

/// What [`MaterialIndex::insert`] had to create
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// The accumulator already existed
    Existing,
    /// The material existed; a new accumulator was added to it
    NewAccumulator,
    /// A new material node was added to the tree
    NewNode,
}

/// One material in the tree
#[derive(Debug)]
pub struct MaterialNode {
    material: MaterialKey,
    height: usize,
    children: [Link; 2],
    accumulators: Vec<BatchAccumulator>,
}

impl MaterialNode {
    /// Material of this node
    pub fn material(&self) -> MaterialKey {
        self.material
    }

    /// Height of the subtree rooted here; a leaf has height 1
    pub fn height(&self) -> usize {
        self.height
    }

    /// Accumulators of this material, ordered by primitive kind
    pub fn accumulators(&self) -> &[BatchAccumulator] {
        &self.accumulators
    }

    fn position(&self, primitive: PrimitiveKind) -> Result<usize, usize> {
        self.accumulators
            .binary_search_by_key(&primitive, |accumulator| accumulator.key().primitive)
    }

    fn accumulator(&self, primitive: PrimitiveKind) -> Option<&BatchAccumulator> {
        self.position(primitive).ok().map(|index| &self.accumulators[index])
    }

    fn accumulator_mut(&mut self, primitive: PrimitiveKind) -> Option<&mut BatchAccumulator> {
        match self.position(primitive) {
            Ok(index) => Some(&mut self.accumulators[index]),
            Err(_) => None,
        }
    }

    fn update_height(&mut self) {
        self.height = 1 + height(&self.children[LEFT]).max(height(&self.children[RIGHT]));
    }

    /// Left height minus right height
    fn balance(&self) -> isize {
        height(&self.children[LEFT]) as isize - height(&self.children[RIGHT]) as isize
    }
}

fn height(link: &Link) -> usize {
    link.as_ref().map_or(0, |node| node.height)
}

/// Lift the child on side `side` into the position of `link`
fn rotate(link: &mut Link, side: usize) {
    let mut node = match link.take() {
        Some(node) => node,
        None => return,
    };
    match node.children[side].take() {
        Some(mut pivot) => {
            node.children[side] = pivot.children[1 - side].take();
            node.update_height();
            pivot.children[1 - side] = Some(node);
            pivot.update_height();
            *link = Some(pivot);
        }
        None => *link = Some(node),
    }
}

fn rebalance(link: &mut Link) {
    let node = match link.as_mut() {
        Some(node) => node,
        None => return,
    };
    node.update_height();
    let heavy = match node.balance() {
        balance if balance > 1 => LEFT,
        balance if balance < -1 => RIGHT,
        _ => return,
    };
    let child_leans_away = node.children[heavy].as_ref().map_or(false, |child| {
        let lean = child.balance();
        if heavy == LEFT {
            lean < 0
        } else {
            lean > 0
        }
    });
    if child_leans_away {
        rotate(&mut node.children[heavy], 1 - heavy);
    }
    rotate(link, heavy);
}

fn insert_at<F>(link: &mut Link, material: MaterialKey, primitive: PrimitiveKind, create: F) -> CacheResult<Insertion>
where
    F: FnOnce() -> CacheResult<BatchAccumulator>,
{
    let outcome = match link {
        None => {
            let mut accumulators = Vec::new();
            accumulators.try_reserve(1)?;
            accumulators.push(create()?);
            *link = Some(Box::new(MaterialNode {
                material,
                height: 1,
                children: [None, None],
                accumulators,
            }));
            return Ok(Insertion::NewNode);
        }
        Some(node) => match material.cmp(&node.material) {
            Ordering::Equal => {
                return match node.position(primitive) {
                    Ok(_) => Ok(Insertion::Existing),
                    Err(index) => {
                        node.accumulators.try_reserve(1)?;
                        node.accumulators.insert(index, create()?);
                        Ok(Insertion::NewAccumulator)
                    }
                };
            }
            Ordering::Less => insert_at(&mut node.children[LEFT], material, primitive, create)?,
            Ordering::Greater => insert_at(&mut node.children[RIGHT], material, primitive, create)?,
        },
    };
    if outcome == Insertion::NewNode {
        rebalance(link);
    }
    Ok(outcome)
}

fn visit_mut<F: FnMut(&mut MaterialNode)>(link: &mut Link, visit: &mut F) {
    if let Some(node) = link {
        visit_mut(&mut node.children[LEFT], visit);
        visit(node);
        visit_mut(&mut node.children[RIGHT], visit);
    }
}

fn release_subtree(link: Link, device: &mut dyn GraphicsDevice) {
    if let Some(node) = link {
        let MaterialNode {
            children: [left, right],
            accumulators,
            ..
        } = *node;
        release_subtree(left, device);
        for accumulator in accumulators {
            accumulator.release(device);
        }
        release_subtree(right, device);
    }
}

/// In-order iterator over the nodes of a [`MaterialIndex`]
pub struct Iter<'a> {
    stack: Vec<&'a MaterialNode>,
    next: Option<&'a MaterialNode>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a MaterialNode;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(node) = self.next.take() {
            self.stack.push(node);
            self.next = node.children[LEFT].as_deref();
        }
        let node = self.stack.pop()?;
        self.next = node.children[RIGHT].as_deref();
        Some(node)
    }
}

/// Balanced material tree for one vertex layout
#[derive(Debug)]
pub struct MaterialIndex {
    layout: VertexLayout,
    root: Link,
    len: usize,
}

impl MaterialIndex {
    /// Create an empty index for `layout`
    pub fn new(layout: VertexLayout) -> Self {
        Self {
            layout,
            root: None,
            len: 0,
        }
    }

    /// Layout shared by every accumulator in the index
    pub fn layout(&self) -> VertexLayout {
        self.layout
    }

    /// Number of material nodes
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Height of the tree; 0 when empty
    pub fn height(&self) -> usize {
        height(&self.root)
    }

    /// Total number of accumulators across all materials
    pub fn accumulator_count(&self) -> usize {
        self.iter().map(|node| node.accumulators.len()).sum()
    }

    /// Nodes in ascending material order
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            stack: Vec::new(),
            next: self.root.as_deref(),
        }
    }

    /// Materials in ascending order
    pub fn keys(&self) -> Vec<MaterialKey> {
        self.iter().map(|node| node.material).collect()
    }

    /// Node for `material`, if present
    pub fn node(&self, material: MaterialKey) -> Option<&MaterialNode> {
        let mut current = self.root.as_deref();
        while let Some(node) = current {
            current = match material.cmp(&node.material) {
                Ordering::Equal => return Some(node),
                Ordering::Less => node.children[LEFT].as_deref(),
                Ordering::Greater => node.children[RIGHT].as_deref(),
            };
        }
        None
    }

    /// Accumulator for `(material, primitive)`, if it was ever inserted
    pub fn get(&self, material: MaterialKey, primitive: PrimitiveKind) -> Option<&BatchAccumulator> {
        self.node(material)?.accumulator(primitive)
    }

    pub(crate) fn get_mut(&mut self, material: MaterialKey, primitive: PrimitiveKind) -> Option<&mut BatchAccumulator> {
        let mut current = self.root.as_deref_mut();
        while let Some(node) = current {
            current = match material.cmp(&node.material) {
                Ordering::Equal => return node.accumulator_mut(primitive),
                Ordering::Less => node.children[LEFT].as_deref_mut(),
                Ordering::Greater => node.children[RIGHT].as_deref_mut(),
            };
        }
        None
    }

    /// Make sure an accumulator exists for `(material, primitive)`
    ///
    /// `create` is called only when the accumulator is missing.
    pub(crate) fn insert<F>(&mut self, material: MaterialKey, primitive: PrimitiveKind, create: F) -> CacheResult<Insertion>
    where
        F: FnOnce() -> CacheResult<BatchAccumulator>,
    {
        let outcome = insert_at(&mut self.root, material, primitive, create)?;
        match outcome {
            Insertion::NewNode => {
                self.len += 1;
                log::trace!("{:?} index: added material {:?} ({} nodes)", self.layout, material, self.len);
            }
            Insertion::NewAccumulator => {
                log::trace!("{:?} index: added {:?} to material {:?}", self.layout, primitive, material);
            }
            Insertion::Existing => {}
        }
        Ok(outcome)
    }

    /// Render every accumulator in ascending material order
    ///
    /// After the first failure the remaining accumulators are discarded and
    /// that failure is returned.
    pub(crate) fn flush(&mut self, ctx: &mut FrameContext<'_>) -> CacheResult<()> {
        let mut first_error = None;
        visit_mut(&mut self.root, &mut |node: &mut MaterialNode| {
            for accumulator in &mut node.accumulators {
                if first_error.is_some() {
                    accumulator.discard();
                } else if let Err(err) = accumulator.render(ctx) {
                    first_error = Some(err);
                }
            }
        });
        first_error.map_or(Ok(()), Err)
    }

    /// Drop all pending geometry without drawing it
    pub(crate) fn discard_all(&mut self) {
        visit_mut(&mut self.root, &mut |node: &mut MaterialNode| {
            node.accumulators.iter_mut().for_each(BatchAccumulator::discard);
        });
    }

    /// Remove every node, releasing the accumulators' device buffers
    pub(crate) fn clear(&mut self, device: &mut dyn GraphicsDevice) {
        if self.len > 0 {
            log::debug!("Clearing {:?} index ({} materials)", self.layout, self.len);
        }
        release_subtree(self.root.take(), device);
        self.len = 0;
    }
}
