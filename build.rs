use vergen_gitcl::{CargoBuilder, Emitter, GitclBuilder};

fn main() -> Result<(), Box<dyn std::error::Error>> {
	let mut emitter = Emitter::default();

	emitter.add_instructions(&CargoBuilder::default().target_triple(true).build()?)?;

	// Source tarballs have no git metadata.
	if emitter
		.clone()
		.add_instructions(&GitclBuilder::default().sha(true).build()?)?
		.fail_on_error()
		.emit()
		.is_err()
	{
		println!("cargo:rustc-env=VERGEN_GIT_SHA=unknown");

		emitter.emit()?;
	}

	Ok(())
}
