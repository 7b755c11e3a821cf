use crate::foundation::error::{CollageError, CollageResult};
use crate::nft::record::NftRecord;
use crate::nft::selection::Selection;
use crate::pipeline::artifact::ArtifactKind;

/// What the last successful export produced.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputSummary {
    pub kind: ArtifactKind,
    pub file_name: String,
    pub byte_len: usize,
}

/// Per-user state: the owned NFT list, the ordered selection, and the last output.
#[derive(Clone, Debug)]
pub struct Session {
    wallet: Option<String>,
    nfts: Vec<NftRecord>,
    selection: Selection,
    last_output: Option<OutputSummary>,
}

impl Session {
    pub fn new(min_selection: usize, max_selection: usize) -> Self {
        Self {
            wallet: None,
            nfts: Vec::new(),
            selection: Selection::new(min_selection, max_selection),
            last_output: None,
        }
    }

    /// Replace the NFT list; the old selection and output no longer apply.
    pub fn load(&mut self, wallet: &str, nfts: Vec<NftRecord>) {
        self.wallet = Some(wallet.to_string());
        self.nfts = nfts;
        let (min, max) = self.selection.bounds();
        self.selection = Selection::new(min, max);
        self.last_output = None;
    }

    pub fn wallet(&self) -> Option<&str> {
        self.wallet.as_deref()
    }

    pub fn nfts(&self) -> &[NftRecord] {
        &self.nfts
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn toggle(&mut self, idx: usize) -> CollageResult<bool> {
        self.check_index(idx)?;
        self.selection.toggle(idx)
    }

    pub fn swap(&mut self, a: usize, b: usize) -> CollageResult<()> {
        self.selection.swap(a, b)
    }

    /// Replace the whole selection at once.
    pub fn select(&mut self, order: Vec<usize>) -> CollageResult<()> {
        for &idx in &order {
            self.check_index(idx)?;
        }
        let (min, max) = self.selection.bounds();
        self.selection = Selection::from_order(order, min, max)?;
        Ok(())
    }

    /// Selected records in slot order; fails when the selection is too small.
    pub fn selected_records(&self) -> CollageResult<Vec<NftRecord>> {
        self.selection.ensure_ready()?;
        self.selection
            .order()
            .iter()
            .map(|&i| {
                self.nfts.get(i).cloned().ok_or_else(|| {
                    CollageError::user_input(format!("selected NFT #{i} is not in the list"))
                })
            })
            .collect()
    }

    pub fn last_output(&self) -> Option<&OutputSummary> {
        self.last_output.as_ref()
    }

    pub fn set_last_output(&mut self, summary: OutputSummary) {
        self.last_output = Some(summary);
    }

    fn check_index(&self, idx: usize) -> CollageResult<()> {
        if idx >= self.nfts.len() {
            return Err(CollageError::user_input(format!(
                "NFT #{idx} does not exist ({} loaded)",
                self.nfts.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nft(id: &str) -> NftRecord {
        NftRecord::new(id, format!("NODES #{id}"), Some(format!("https://x/{id}.png")), None)
    }

    #[test]
    fn load_resets_selection() {
        let mut s = Session::new(2, 8);
        s.load("0xa", vec![nft("1"), nft("2"), nft("3")]);
        s.toggle(2).unwrap();
        s.toggle(0).unwrap();
        let names: Vec<String> = s
            .selected_records()
            .unwrap()
            .into_iter()
            .map(|n| n.token_id)
            .collect();
        assert_eq!(names, vec!["3", "1"]);

        s.load("0xb", vec![nft("9")]);
        assert!(s.selection().is_empty());
        assert_eq!(s.wallet(), Some("0xb"));
    }

    #[test]
    fn out_of_range_indices_are_user_errors() {
        let mut s = Session::new(2, 8);
        s.load("0xa", vec![nft("1"), nft("2")]);
        assert!(matches!(s.toggle(5), Err(CollageError::UserInput(_))));
        assert!(s.select(vec![0, 7]).is_err());
        s.select(vec![1, 0]).unwrap();
        assert_eq!(s.selection().order(), &[1, 0]);
    }

    #[test]
    fn export_needs_minimum_selection() {
        let mut s = Session::new(2, 8);
        s.load("0xa", vec![nft("1"), nft("2")]);
        s.toggle(0).unwrap();
        assert!(matches!(
            s.selected_records(),
            Err(CollageError::UserInput(_))
        ));
    }
}
