//! Pending procedural block terminators.

/// LIFO of the delimiters (e.g. `$do$`, `$$`) of the blocks currently open.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockStack {
    tokens: Vec<String>,
}

impl BlockStack {
    /// Empty stack
    pub fn new() -> BlockStack {
        BlockStack::default()
    }

    /// Open a block ended by `token`.
    pub fn push(&mut self, token: String) {
        self.tokens.push(token);
    }

    /// Remove the innermost delimiter.
    ///
    /// # Panics
    ///
    /// Panics if the stack is empty.
    pub fn pop(&mut self) -> String {
        self.tokens.pop().expect("pop on empty block stack")
    }

    /// Innermost delimiter, if any block is open.
    pub fn peek_last(&self) -> Option<&str> {
        self.tokens.last().map(String::as_str)
    }

    /// Whether no block is open
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Nesting depth
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Forget every open block.
    pub fn clear(&mut self) {
        self.tokens.clear();
    }
}

#[cfg(test)]
mod test {
    use super::BlockStack;

    #[test]
    fn lifo() {
        let mut stack = BlockStack::new();
        assert!(stack.is_empty());
        stack.push("$do$".to_owned());
        stack.push("UPDATE".to_owned());
        assert_eq!(2, stack.len());
        assert_eq!(Some("UPDATE"), stack.peek_last());
        assert_eq!("UPDATE", stack.pop());
        assert_eq!("$do$", stack.pop());
        assert_eq!(None, stack.peek_last());
    }

    #[test]
    #[should_panic(expected = "empty block stack")]
    fn pop_empty() {
        BlockStack::new().pop();
    }
}
