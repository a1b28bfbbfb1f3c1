use crate::model::condenser::Condenser;
use crate::model::document::Document;
use crate::model::response::{QueueState, Response};

/// The unit of work flowing through the indexing pipeline.
///
/// `documents` is filled by Parse and `condensers` by Condense. Whenever
/// condensers are present they are index-aligned with the documents; a
/// `None` slot means the document is excluded from indexing.
#[derive(Debug, Clone)]
pub struct IndexingQueueEntry {
    response: Response,
    documents: Option<Vec<Document>>,
    condensers: Option<Vec<Option<Condenser>>>,
}

impl IndexingQueueEntry {
    pub fn new(response: Response) -> Self {
        Self {
            response,
            documents: None,
            condensers: None,
        }
    }

    /// Entry for an already parsed document set (surrogate import).
    pub fn with_documents(response: Response, documents: Vec<Document>) -> Self {
        Self {
            response,
            documents: Some(documents),
            condensers: None,
        }
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn documents(&self) -> Option<&[Document]> {
        self.documents.as_deref()
    }

    pub fn condensers(&self) -> Option<&[Option<Condenser>]> {
        self.condensers.as_deref()
    }

    /// Replace the document list. Any previous condensers no longer line
    /// up with it and are discarded.
    pub fn set_documents(&mut self, documents: Vec<Document>) {
        self.documents = Some(documents);
        self.condensers = None;
    }

    pub fn take_documents(&mut self) -> Vec<Document> {
        self.condensers = None;
        self.documents.take().unwrap_or_default()
    }

    /// Install documents and their condensers together, keeping them aligned.
    pub fn set_condensed(&mut self, pairs: Vec<(Document, Option<Condenser>)>) {
        let (documents, condensers): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        self.documents = Some(documents);
        self.condensers = Some(condensers);
    }

    /// Consume the aligned document/condenser pairs. Empty when the entry
    /// was never condensed.
    pub fn take_condensed(&mut self) -> Vec<(Document, Option<Condenser>)> {
        match (self.documents.take(), self.condensers.take()) {
            (Some(documents), Some(condensers)) => documents.into_iter().zip(condensers).collect(),
            (documents, None) => {
                self.documents = documents;
                Vec::new()
            }
            (None, Some(_)) => Vec::new(),
        }
    }

    pub fn update_status(&self, state: QueueState) {
        self.response.update_status(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProfileHandle, Request};

    fn entry() -> IndexingQueueEntry {
        let request = Request::new("http://example.test/", ProfileHandle::new("p"), 0);
        IndexingQueueEntry::new(Response::new(request, "text/html", Some(b"x".to_vec())))
    }

    #[test]
    fn test_condensed_pairs_stay_aligned() {
        let mut entry = entry();
        let a = Document::new("http://example.test/a", "text/html", "alpha");
        let b = Document::new("http://example.test/b", "text/html", "beta");
        let condenser = Condenser::new(&a, None);
        entry.set_condensed(vec![(a.clone(), Some(condenser.clone())), (b.clone(), None)]);

        assert_eq!(entry.documents().unwrap().len(), 2);
        assert_eq!(entry.condensers().unwrap().len(), 2);

        let pairs = entry.take_condensed();
        assert_eq!(pairs[0], (a, Some(condenser)));
        assert_eq!(pairs[1], (b, None));
    }

    #[test]
    fn test_new_documents_discard_condensers() {
        let mut entry = entry();
        let doc = Document::new("http://example.test/a", "text/html", "alpha");
        entry.set_condensed(vec![(doc.clone(), None)]);
        entry.set_documents(vec![doc]);
        assert!(entry.condensers().is_none());
        assert!(entry.take_condensed().is_empty());
        assert_eq!(entry.documents().map(|d| d.len()), Some(1));
    }
}
