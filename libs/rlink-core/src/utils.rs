pub trait VecExt<T> {
	fn find_and_remove(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T>;
}

impl<T> VecExt<T> for Vec<T> {
	fn find_and_remove(&mut self, predicate: impl Fn(&T) -> bool) -> Option<T> {
		let index = self.iter().position(predicate)?;
		Some(self.remove(index))
	}
}
