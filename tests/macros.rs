//! Definición, expansión y reinyección de macros.

mod common;

use common::{run, translate};

#[test]
fn call_matches_literal_expansion() {
    let definition = ".model small\n.code\nM macro p, q\n  mov ax, p\n  add ax, q\nendm\n";
    let literal = translate(".model small\n.code\n  mov ax, cx\n  add ax, 5\n");

    assert_eq!(translate(&format!("{}  M(cx, 5)\n", definition)), literal);
    assert_eq!(translate(&format!("{}  M cx, 5\n", definition)), literal);
}

#[test]
fn expansion_continues_with_following_code() {
    let wsl = translate(
        ".model small\n.code\nSet macro reg, value\n  mov reg, value\nendm\n  Set ax, 1\n  Set bx, 2\n  add ax, bx\n",
    );

    let machine = run(&wsl, &[]);
    assert_eq!(machine.get("ax"), 3);
    assert_eq!(machine.get("bx"), 2);
}

#[test]
fn nested_calls_expand_at_definition() {
    let wsl = translate(
        ".model small
.code
SetAx macro v
  mov ax, v
endm
Twice macro v
  SetAx v
  add ax, v
endm
  Twice 3
",
    );

    assert_eq!(run(&wsl, &[]).get("ax"), 6);
}

#[test]
fn negative_actuals() {
    let wsl = translate(".model small\n.code\nLoad macro n\n  mov ax, n\nendm\n  Load -2\n");
    assert_eq!(run(&wsl, &[]).get("ax"), 65534);
}

#[test]
fn macros_without_parameters() {
    let wsl = translate(
        ".model small\n.code\nExit macro\n  mov ah, 4ch\n  int 21h\nendm\n  mov bx, 1\n  Exit\n  mov bx, 2\n",
    );

    assert_eq!(run(&wsl, &[]).get("bx"), 1);
}

#[test]
fn labels_inside_expansions() {
    let wsl = translate(
        ".model small
.data
total dw 0
.code
Sum macro count
  mov cx, count
again:
  add total, cx
  loop again
endm
  Sum 4
",
    );

    assert_eq!(run(&wsl, &[]).get("total"), 10);
}

#[test]
fn macro_names_ignore_case() {
    let definition = ".model small\n.code\nclear macro r\n  mov r, 0\nendm\n";
    assert_eq!(
        translate(&format!("{}  CLEAR dx\n", definition)),
        translate(".model small\n.code\n  mov dx, 0\n")
    );
}
