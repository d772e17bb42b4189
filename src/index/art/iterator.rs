use super::node::{Kind, Node};
use crate::index::MemValue;

/// Depth-first, zero-leaf-first iterator over a tree's leaves, yielding
/// fully reconstructed keys.
///
/// The original walks an explicit stack of `(node, visited)` packets and,
/// on reaching each leaf, rescans the whole stack for visited ancestors to
/// rebuild the key. This keeps an explicit prefix alongside the stack
/// instead: entering an interior node pushes its key onto the prefix and
/// schedules a matching pop, so the prefix is always exactly the
/// concatenation of the ancestor chain currently being visited.
pub(super) struct ArtIterator<'a> {
    stack: Vec<Frame<'a>>,
    prefix: Vec<u8>,
}

enum Frame<'a> {
    Enter(&'a Node),
    Leave(usize),
}

impl<'a> ArtIterator<'a> {
    pub(super) fn new(root: Option<&'a Node>) -> Self {
        let mut stack = Vec::new();
        if let Some(root) = root {
            stack.push(Frame::Enter(root));
        }
        Self { stack, prefix: Vec::new() }
    }
}

impl<'a> Iterator for ArtIterator<'a> {
    type Item = (Vec<u8>, MemValue);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(frame) = self.stack.pop() {
            match frame {
                Frame::Leave(len) => self.prefix.truncate(len),
                Frame::Enter(node) => {
                    if node.kind() == Kind::Leaf {
                        let mut key = self.prefix.clone();
                        key.extend_from_slice(node.key());
                        let value = node.value().expect("leaf always carries a value").clone();
                        return Some((key, value));
                    }

                    let restore_len = self.prefix.len();
                    self.prefix.extend_from_slice(node.key());
                    self.stack.push(Frame::Leave(restore_len));

                    for child in node.list_all_child().into_iter().rev() {
                        self.stack.push(Frame::Enter(child));
                    }
                }
            }
        }
        None
    }
}
