//! Text dumps of discovered certification paths
//!
//! Each path is written starting with a header line followed by one block per node, beginning with
//! the leaf (usually a trust anchor) and ending with the target. Each block is indented two spaces
//! deeper than the one before it.

use alloc::format;
use alloc::string::String;
use core::fmt;

use der::Encode;

use crate::{
    builder::path_tree::*, environment::pki_environment::PkiEnvironment, util::pdv_utilities::*,
    PDVCertificate,
};

/// Number of bytes rendered per line of hex output
const HEX_BYTES_PER_LINE: usize = 32;

fn write_indent(out: &mut dyn fmt::Write, indent: usize) -> fmt::Result {
    write!(out, "{:1$}", "", indent)
}

fn write_hex(out: &mut dyn fmt::Write, indent: usize, buf: &[u8]) -> fmt::Result {
    for chunk in buf.chunks(HEX_BYTES_PER_LINE) {
        write_indent(out, indent)?;
        writeln!(out, "{}", buffer_to_hex(chunk))?;
    }
    Ok(())
}

fn write_extensions(
    pe: &PkiEnvironment,
    out: &mut dyn fmt::Write,
    indent: usize,
    cert: &PDVCertificate,
) -> fmt::Result {
    if let Some(exts) = &cert.decoded_cert.tbs_certificate.extensions {
        for ext in exts {
            write_indent(out, indent)?;
            let name = pe.oid_lookup(&ext.extn_id);
            let mut line = format!("Extension: {}", ext.extn_id);
            if name != ext.extn_id.to_string() {
                line.push_str(format!(" ({})", name).as_str());
            }
            if ext.critical {
                line.push_str(", critical");
            }
            writeln!(out, "{}", line)?;
        }
    }
    Ok(())
}

fn write_node(
    pe: &PkiEnvironment,
    out: &mut dyn fmt::Write,
    indent: usize,
    node: &PathNode,
    verbosity: u32,
) -> fmt::Result {
    if let Some(cert) = node.cert() {
        let tbs = &cert.decoded_cert.tbs_certificate;
        write_indent(out, indent)?;
        writeln!(out, "Issuer : {}", name_to_slash_string(&tbs.issuer))?;
        write_indent(out, indent)?;
        writeln!(out, "Subject: {}", name_to_slash_string(&tbs.subject))?;
        if verbosity >= 4 {
            write_hex(out, indent, &cert.encoded_cert)?;
        } else if verbosity >= 3 {
            write_extensions(pe, out, indent, cert)?;
        }
        write_indent(out, indent)?;
        writeln!(
            out,
            "Valid  : {} thru {}",
            tbs.validity.not_before, tbs.validity.not_after
        )?;
    } else {
        let subject = node.subject().map(name_to_slash_string).unwrap_or_default();
        write_indent(out, indent)?;
        writeln!(out, "Subject: {}", subject)?;
        if verbosity >= 4 {
            let ta_info = node.cert_ctx().and_then(|ctx| ctx.ta_info.as_ref());
            if let Some(enc) = ta_info.and_then(|ta| ta.to_der().ok()) {
                write_hex(out, indent, &enc)?;
            }
        }
    }
    write_indent(out, indent)?;
    writeln!(out, "Source : {}", node.source())
}

/// `dump_path` writes the path ending at `leaf` to `out`. `index` is the position of the leaf in
/// the leaf list and is used only in the header line.
///
/// Verbosity 3 adds a line for each extension in each certificate. Verbosity 4 and above replaces
/// those lines with the encoded certificate, or trust anchor information, as hex.
pub fn dump_path(
    pe: &PkiEnvironment,
    tree: &PathTree,
    index: usize,
    leaf: NodeId,
    verbosity: u32,
    out: &mut dyn fmt::Write,
) -> fmt::Result {
    let leaf_node = match tree.node(leaf) {
        Some(n) => n,
        None => return Err(fmt::Error),
    };
    writeln!(
        out,
        "Path #{}: {}, {} deep, rcVerify={}",
        index,
        if leaf_node.source().is_trusted() {
            "trusted"
        } else {
            "untrusted"
        },
        leaf_node.depth(),
        leaf_node.verify_result
    )?;

    let mut indent = 2;
    for id in tree.ancestors(leaf) {
        if let Some(node) = tree.node(id) {
            write_node(pe, out, indent, node, verbosity)?;
        }
        indent += 2;
    }
    Ok(())
}

/// `dump_path_to_string` returns the output of [`dump_path`] as a String.
pub fn dump_path_to_string(
    pe: &PkiEnvironment,
    tree: &PathTree,
    index: usize,
    leaf: NodeId,
    verbosity: u32,
) -> String {
    let mut s = String::new();
    if dump_path(pe, tree, index, leaf, verbosity, &mut s).is_err() {
        s.clear();
    }
    s
}

#[test]
fn dump_path_test() {
    use crate::{populate_5280_pki_environment, CertSource, PathBuilder};
    use alloc::sync::Arc;

    let mut pe = PkiEnvironment::new();
    populate_5280_pki_environment(&mut pe);
    let root = Arc::new(
        PDVCertificate::try_from(include_bytes!("../../tests/examples/root.der").as_slice())
            .unwrap(),
    );
    let ca = Arc::new(
        PDVCertificate::try_from(
            include_bytes!("../../tests/examples/intermediate.der").as_slice(),
        )
        .unwrap(),
    );
    let target = Arc::new(
        PDVCertificate::try_from(include_bytes!("../../tests/examples/target.der").as_slice())
            .unwrap(),
    );
    let intermediates = [ca];
    let mut tree = PathTree::new();
    let mut pb = PathBuilder::new(&target);
    pb.trusted_cert = Some(&root);
    pb.untrusted_array = &intermediates;
    pb.build(&mut tree).unwrap();
    let leaf = tree.leaf(0).unwrap();

    let s = dump_path_to_string(&pe, &tree, 0, leaf, 1);
    let lines: alloc::vec::Vec<&str> = s.lines().collect();
    assert_eq!("Path #0: trusted, 2 deep, rcVerify=NotVerified", lines[0]);
    assert_eq!(
        "  Issuer : /c=US/o=Certpaths Test/cn=Test Root CA",
        lines[1]
    );
    assert_eq!(
        "  Subject: /c=US/o=Certpaths Test/cn=Test Root CA",
        lines[2]
    );
    assert!(lines[3].starts_with("  Valid  : "));
    assert_eq!(
        format!("  Source : {}", CertSource::TrustedCert),
        lines[4]
    );
    assert_eq!(
        "      Subject: /c=US/o=Certpaths Test/cn=Target EE",
        lines[10]
    );
    assert_eq!(13, lines.len());

    let s = dump_path_to_string(&pe, &tree, 0, leaf, 3);
    assert!(s.contains("Extension: 2.5.29.19 (basicConstraints), critical"));
    assert!(!s.contains(&buffer_to_hex(&target.encoded_cert[..HEX_BYTES_PER_LINE])));

    let s = dump_path_to_string(&pe, &tree, 0, leaf, 4);
    assert!(s.contains(&buffer_to_hex(&target.encoded_cert[..HEX_BYTES_PER_LINE])));
    assert!(!s.contains("Extension: "));
}
