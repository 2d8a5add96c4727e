//! # Content Automaton
//!
//! Compiles content expressions into deterministic finite automata used for
//! validation, filling, and wrap-finding. Each grammar construct maps to a
//! fixed NFA edge pattern; the NFA is then subset-constructed into a DFA
//! whose states live in an arena owned by the schema.
//!
//! Edge ordering is load-bearing: edges are emitted in declaration order
//! and that order survives the powerset construction, because `fill_before`
//! returns the *first* admissible filler, not the shortest one. Downstream
//! structural commands depend on which filler is chosen.

use crate::error::SchemaError;
use crate::expr::Expr;
use crate::fragment::Fragment;
use crate::mark::Mark;
use crate::schema::{NodeType, Schema};
use std::collections::HashMap;
use std::fmt;

/// One deterministic automaton state: whether the expression may end here,
/// and the ordered outgoing edges (node type id, next state id).
pub(crate) struct StateData {
    pub(crate) valid_end: bool,
    pub(crate) edges: Vec<(usize, usize)>,
}

/// A handle on one automaton state. `match_type` walks an edge,
/// `fill_before` searches for generatable filler content, `find_wrapping`
/// searches for a wrapper chain.
#[derive(Clone)]
pub struct ContentMatch {
    schema: Schema,
    state: usize,
}

impl ContentMatch {
    pub(crate) fn new(schema: Schema, state: usize) -> Self {
        Self { schema, state }
    }

    pub(crate) fn state(&self) -> usize {
        self.state
    }

    pub fn valid_end(&self) -> bool {
        self.schema.state_data(self.state).valid_end
    }

    pub fn edge_count(&self) -> usize {
        self.schema.state_data(self.state).edges.len()
    }

    /// The type and next state of the edge at `index`, if any
    pub fn edge(&self, index: usize) -> Option<(NodeType, ContentMatch)> {
        let (type_id, next) = *self.schema.state_data(self.state).edges.get(index)?;
        Some((
            self.schema.node_type_by_id(type_id),
            ContentMatch::new(self.schema.clone(), next),
        ))
    }

    /// Walk the edge labeled with the given type
    pub fn match_type(&self, node_type: &NodeType) -> Option<ContentMatch> {
        self.match_type_id(node_type.id())
            .map(|next| ContentMatch::new(self.schema.clone(), next))
    }

    fn match_type_id(&self, type_id: usize) -> Option<usize> {
        self.schema
            .state_data(self.state)
            .edges
            .iter()
            .find(|(t, _)| *t == type_id)
            .map(|(_, next)| *next)
    }

    /// Match every child of a fragment in order
    pub fn match_fragment(&self, fragment: &Fragment) -> Option<ContentMatch> {
        self.match_fragment_range(fragment, 0, fragment.child_count())
    }

    /// Match the children of a fragment between two indices
    pub fn match_fragment_range(
        &self,
        fragment: &Fragment,
        start: usize,
        end: usize,
    ) -> Option<ContentMatch> {
        let mut state = self.state;
        for i in start..end {
            let child = fragment.maybe_child(i)?;
            state = ContentMatch::new(self.schema.clone(), state)
                .match_type_id(child.node_type().id())?;
        }
        Some(ContentMatch::new(self.schema.clone(), state))
    }

    /// Search for a sequence of auto-creatable node types whose insertion
    /// before `after` (starting at `start_index`) makes the content match,
    /// optionally requiring a valid end state afterwards. Edges are tried
    /// in declaration order and the first admissible filler wins.
    pub fn fill_before(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
    ) -> Option<Fragment> {
        let mut seen = vec![self.state];
        self.search_fill(after, to_end, start_index, &mut seen, &mut Vec::new())
    }

    fn search_fill(
        &self,
        after: &Fragment,
        to_end: bool,
        start_index: usize,
        seen: &mut Vec<usize>,
        types: &mut Vec<usize>,
    ) -> Option<Fragment> {
        if let Some(finished) =
            self.match_fragment_range(after, start_index, after.child_count())
        {
            if !to_end || finished.valid_end() {
                let mut filler = Vec::new();
                for &type_id in types.iter() {
                    let node_type = self.schema.node_type_by_id(type_id);
                    filler.push(node_type.create_and_fill(None, None, Mark::none())?);
                }
                return Some(Fragment::from_vec(filler));
            }
        }
        let edges = self.schema.state_data(self.state).edges.clone();
        for (type_id, next) in edges {
            let data = self.schema.node_data(type_id);
            if !(data.is_text || data.has_required_attrs) && !seen.contains(&next) {
                seen.push(next);
                types.push(type_id);
                let found = ContentMatch::new(self.schema.clone(), next)
                    .search_fill(after, to_end, start_index, seen, types);
                if found.is_some() {
                    return found;
                }
                types.pop();
            }
        }
        None
    }

    /// Find the shortest chain of auto-creatable wrapper types that would
    /// admit the target type. Results are memoized per (state, target) in
    /// the schema.
    pub fn find_wrapping(&self, target: &NodeType) -> Option<Vec<NodeType>> {
        let key = (self.state, target.id());
        if let Some(cached) = self.schema.wrap_cache_get(&key) {
            return cached.map(|ids| {
                ids.into_iter()
                    .map(|id| self.schema.node_type_by_id(id))
                    .collect()
            });
        }
        let computed = self.compute_wrapping(target.id());
        self.schema.wrap_cache_put(key, computed.clone());
        computed.map(|ids| {
            ids.into_iter()
                .map(|id| self.schema.node_type_by_id(id))
                .collect()
        })
    }

    fn compute_wrapping(&self, target: usize) -> Option<Vec<usize>> {
        struct Frame {
            state: usize,
            type_id: Option<usize>,
            via: Option<usize>,
        }

        let mut seen: Vec<usize> = Vec::new();
        let mut frames = vec![Frame {
            state: self.state,
            type_id: None,
            via: None,
        }];
        let mut head = 0;

        while head < frames.len() {
            let current = head;
            head += 1;
            let state = frames[current].state;
            if ContentMatch::new(self.schema.clone(), state)
                .match_type_id(target)
                .is_some()
            {
                let mut result = Vec::new();
                let mut cursor = current;
                while let Some(type_id) = frames[cursor].type_id {
                    result.push(type_id);
                    cursor = frames[cursor].via.expect("chained frame has a parent");
                }
                result.reverse();
                return Some(result);
            }
            let edges = self.schema.state_data(state).edges.clone();
            for (type_id, next) in edges {
                let data = self.schema.node_data(type_id);
                let first_hop = frames[current].type_id.is_none();
                if !data.is_leaf
                    && !data.has_required_attrs
                    && !seen.contains(&type_id)
                    && (first_hop || self.schema.state_data(next).valid_end)
                {
                    seen.push(type_id);
                    frames.push(Frame {
                        state: data.content_start,
                        type_id: Some(type_id),
                        via: Some(current),
                    });
                }
            }
        }
        None
    }

    /// The first auto-creatable type this state admits
    pub fn default_type(&self) -> Option<NodeType> {
        for &(type_id, _) in &self.schema.state_data(self.state).edges {
            let data = self.schema.node_data(type_id);
            if !(data.is_text || data.has_required_attrs) {
                return Some(self.schema.node_type_by_id(type_id));
            }
        }
        None
    }

    /// Whether the two states admit any node type in common
    pub fn compatible(&self, other: &ContentMatch) -> bool {
        let ours = &self.schema.state_data(self.state).edges;
        let theirs = &other.schema.state_data(other.state).edges;
        ours.iter()
            .any(|(t, _)| theirs.iter().any(|(u, _)| t == u))
    }
}

impl PartialEq for ContentMatch {
    fn eq(&self, other: &Self) -> bool {
        self.schema == other.schema && self.state == other.state
    }
}

impl fmt::Debug for ContentMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let data = self.schema.state_data(self.state);
        write!(f, "ContentMatch(validEnd: {}, edges: [", data.valid_end)?;
        for (i, (type_id, _)) in data.edges.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", self.schema.node_type_by_id(*type_id).name())?;
        }
        write!(f, "])")
    }
}

// ---------------------------------------------------------------------------
// Compilation: expression tree -> NFA -> DFA in the schema's state arena

struct NfaEdge {
    term: Option<usize>,
    to: Option<usize>,
}

struct NfaBuilder<'a> {
    nodes: Vec<Vec<NfaEdge>>,
    type_name: &'a str,
    inline: Option<bool>,
}

type Dangling = Vec<(usize, usize)>;

impl<'a> NfaBuilder<'a> {
    fn node(&mut self) -> usize {
        self.nodes.push(Vec::new());
        self.nodes.len() - 1
    }

    fn edge(&mut self, from: usize, term: Option<usize>, to: Option<usize>) -> (usize, usize) {
        self.nodes[from].push(NfaEdge { term, to });
        (from, self.nodes[from].len() - 1)
    }

    fn connect(&mut self, dangling: &Dangling, to: usize) {
        for &(node, edge) in dangling {
            self.nodes[node][edge].to = Some(to);
        }
    }

    fn compile(
        &mut self,
        expr: &Expr,
        from: usize,
        resolve: &dyn Fn(&str) -> Option<Vec<usize>>,
        inline_of: &dyn Fn(usize) -> bool,
    ) -> Result<Dangling, SchemaError> {
        match expr {
            Expr::Name(name) => {
                let type_ids = resolve(name).ok_or_else(|| SchemaError::UnknownContentName {
                    type_name: self.type_name.to_string(),
                    name: name.clone(),
                })?;
                let mut dangling = Vec::new();
                for type_id in type_ids {
                    let inline = inline_of(type_id);
                    match self.inline {
                        None => self.inline = Some(inline),
                        Some(prev) if prev != inline => {
                            return Err(SchemaError::MixedContent {
                                type_name: self.type_name.to_string(),
                            });
                        }
                        Some(_) => {}
                    }
                    dangling.push(self.edge(from, Some(type_id), None));
                }
                Ok(dangling)
            }
            Expr::Choice(branches) => {
                let mut dangling = Vec::new();
                for branch in branches {
                    dangling.extend(self.compile(branch, from, resolve, inline_of)?);
                }
                Ok(dangling)
            }
            Expr::Seq(items) => {
                let mut cur = from;
                for (i, item) in items.iter().enumerate() {
                    let outs = self.compile(item, cur, resolve, inline_of)?;
                    if i == items.len() - 1 {
                        return Ok(outs);
                    }
                    cur = self.node();
                    self.connect(&outs, cur);
                }
                unreachable!("sequence expressions are never empty")
            }
            Expr::Star(inner) => {
                let looped = self.node();
                self.edge(from, None, Some(looped));
                let outs = self.compile(inner, looped, resolve, inline_of)?;
                self.connect(&outs, looped);
                Ok(vec![self.edge(looped, None, None)])
            }
            Expr::Plus(inner) => {
                let looped = self.node();
                let outs = self.compile(inner, from, resolve, inline_of)?;
                self.connect(&outs, looped);
                let outs = self.compile(inner, looped, resolve, inline_of)?;
                self.connect(&outs, looped);
                Ok(vec![self.edge(looped, None, None)])
            }
            Expr::Opt(inner) => {
                let mut dangling = self.compile(inner, from, resolve, inline_of)?;
                dangling.push(self.edge(from, None, None));
                Ok(dangling)
            }
            Expr::Range { min, max, expr } => {
                let mut cur = from;
                for _ in 0..*min {
                    let next = self.node();
                    let outs = self.compile(expr, cur, resolve, inline_of)?;
                    self.connect(&outs, next);
                    cur = next;
                }
                match max {
                    None => {
                        let outs = self.compile(expr, cur, resolve, inline_of)?;
                        self.connect(&outs, cur);
                    }
                    Some(max) => {
                        for _ in *min..*max {
                            let next = self.node();
                            self.edge(cur, None, Some(next));
                            let outs = self.compile(expr, cur, resolve, inline_of)?;
                            self.connect(&outs, next);
                            cur = next;
                        }
                    }
                }
                Ok(vec![self.edge(cur, None, None)])
            }
        }
    }
}

/// Compile a parsed content expression into the schema's state arena and
/// return (start state id, whether the expression matches inline content).
pub(crate) fn compile_expr(
    expr: &Expr,
    type_name: &str,
    resolve: &dyn Fn(&str) -> Option<Vec<usize>>,
    inline_of: &dyn Fn(usize) -> bool,
    states: &mut Vec<StateData>,
) -> Result<(usize, bool), SchemaError> {
    let mut builder = NfaBuilder {
        nodes: vec![Vec::new()],
        type_name,
        inline: None,
    };
    let dangling = builder.compile(expr, 0, resolve, inline_of)?;
    let accepting = builder.node();
    builder.connect(&dangling, accepting);
    let start = nfa_to_dfa(&builder.nodes, states);
    Ok((start, builder.inline.unwrap_or(false)))
}

/// Allocate the automaton state used by leaf node types: no edges, valid
/// end
pub(crate) fn empty_state(states: &mut Vec<StateData>) -> usize {
    states.push(StateData {
        valid_end: true,
        edges: Vec::new(),
    });
    states.len() - 1
}

/// Powerset construction. NFA states reachable through epsilon edges form
/// one deterministic state; the accepting NFA state marks `valid_end`.
fn nfa_to_dfa(nfa: &[Vec<NfaEdge>], states: &mut Vec<StateData>) -> usize {
    let accepting = nfa.len() - 1;
    let mut labeled: HashMap<Vec<usize>, usize> = HashMap::new();
    explore(nfa, accepting, null_from(nfa, 0), &mut labeled, states)
}

fn explore(
    nfa: &[Vec<NfaEdge>],
    accepting: usize,
    set: Vec<usize>,
    labeled: &mut HashMap<Vec<usize>, usize>,
    states: &mut Vec<StateData>,
) -> usize {
    // label → merged closure of targets, in first-seen edge order
    let mut out: Vec<(usize, Vec<usize>)> = Vec::new();
    for &nfa_state in &set {
        for edge in &nfa[nfa_state] {
            let (term, to) = match (edge.term, edge.to) {
                (Some(term), Some(to)) => (term, to),
                _ => continue,
            };
            let slot = match out.iter().position(|(t, _)| *t == term) {
                Some(i) => i,
                None => {
                    out.push((term, Vec::new()));
                    out.len() - 1
                }
            };
            for reached in null_from(nfa, to) {
                if !out[slot].1.contains(&reached) {
                    out[slot].1.push(reached);
                }
            }
        }
    }

    let id = states.len();
    states.push(StateData {
        valid_end: set.contains(&accepting),
        edges: Vec::new(),
    });
    labeled.insert(set, id);

    let mut edges = Vec::with_capacity(out.len());
    for (term, mut target_set) in out {
        target_set.sort_unstable_by(|a, b| b.cmp(a));
        let next = match labeled.get(&target_set) {
            Some(&existing) => existing,
            None => explore(nfa, accepting, target_set, labeled, states),
        };
        edges.push((term, next));
    }
    states[id].edges = edges;
    id
}

/// The epsilon closure of an NFA state, sorted descending. Pass-through
/// states with a single epsilon edge are skipped entirely.
fn null_from(nfa: &[Vec<NfaEdge>], node: usize) -> Vec<usize> {
    let mut result = Vec::new();
    scan(nfa, node, &mut result);
    result.sort_unstable_by(|a, b| b.cmp(a));
    result
}

fn scan(nfa: &[Vec<NfaEdge>], node: usize, result: &mut Vec<usize>) {
    let edges = &nfa[node];
    if edges.len() == 1 && edges[0].term.is_none() {
        if let Some(to) = edges[0].to {
            return scan(nfa, to, result);
        }
    }
    result.push(node);
    for edge in edges {
        if edge.term.is_none() {
            if let Some(to) = edge.to {
                if !result.contains(&to) {
                    scan(nfa, to, result);
                }
            }
        }
    }
}

/// Reject automatons where a reachable non-final state only continues
/// through node types that cannot be generated automatically.
pub(crate) fn check_dead_ends(
    start: usize,
    states: &[StateData],
    generatable: &dyn Fn(usize) -> bool,
) -> Result<(), Vec<usize>> {
    let mut work = vec![start];
    let mut i = 0;
    while i < work.len() {
        let state = &states[work[i]];
        i += 1;
        let mut dead = !state.valid_end;
        let mut names = Vec::new();
        for &(term, next) in &state.edges {
            names.push(term);
            if dead && generatable(term) {
                dead = false;
            }
            if !work.contains(&next) {
                work.push(next);
            }
        }
        if dead {
            return Err(names);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::fragment::Fragment;
    use crate::test_util::TestSchema;

    #[test]
    fn match_walks_in_declaration_order() {
        let ts = TestSchema::new();
        let doc_type = ts.schema.node_type("doc").unwrap();
        let para = ts.schema.node_type("paragraph").unwrap();
        let m = doc_type.content_match();
        assert!(!m.valid_end());
        let after = m.match_type(&para).unwrap();
        assert!(after.valid_end());
    }

    #[test]
    fn match_fragment_fails_on_disallowed_children() {
        let ts = TestSchema::new();
        let para = ts.schema.node_type("paragraph").unwrap();
        let frag = Fragment::from(ts.p(vec![]));
        assert!(para.content_match().match_fragment(&frag).is_none());
    }

    #[test]
    fn fill_before_prefers_declaration_order() {
        let ts = TestSchema::new();
        let doc_type = ts.schema.node_type("doc").unwrap();
        // an empty doc needs one block; paragraph is declared first, so the
        // filler must be a paragraph even though heading would also do
        let fill = doc_type
            .content_match()
            .fill_before(&Fragment::empty(), true, 0)
            .unwrap();
        assert_eq!(fill.child_count(), 1);
        assert_eq!(fill.child(0).node_type().name(), "paragraph");
    }

    #[test]
    fn find_wrapping_produces_shortest_chain() {
        let ts = TestSchema::new();
        let doc_type = ts.schema.node_type("doc").unwrap();
        let text = ts.schema.node_type("text").unwrap();
        let wrap = doc_type.content_match().find_wrapping(&text).unwrap();
        assert_eq!(wrap.len(), 1);
        assert_eq!(wrap[0].name(), "paragraph");
        // cached second lookup returns the same chain
        let again = doc_type.content_match().find_wrapping(&text).unwrap();
        assert_eq!(again.len(), 1);
    }

    #[test]
    fn bounded_repetition_is_enforced() {
        let ts = TestSchema::with_nodes(&[
            ("doc", "paragraph{2,3}"),
            ("paragraph", "inline*"),
            ("text", ""),
        ]);
        let doc_type = ts.schema.node_type("doc").unwrap();
        let one = Fragment::from(ts.p(vec![]));
        let two = one.append(&Fragment::from(ts.p(vec![])));
        let m1 = doc_type.content_match().match_fragment(&one).unwrap();
        assert!(!m1.valid_end());
        let m2 = doc_type.content_match().match_fragment(&two).unwrap();
        assert!(m2.valid_end());
        let four = two.append(&two.clone());
        assert!(doc_type.content_match().match_fragment(&four).is_none());
    }
}
