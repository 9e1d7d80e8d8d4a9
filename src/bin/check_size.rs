use std::mem::{align_of, size_of};

use fastexpr::meta::Ty;
use fastexpr::value::Value;
use fastexpr::vm::method::Op;

fn main() {
    println!("Size of Value: {}", size_of::<Value>());
    println!("Size of Ty: {}", size_of::<Ty>());
    println!("Size of Op: {}", size_of::<Op>());
    println!("Align of Value: {}", align_of::<Value>());
    println!("Align of Op: {}", align_of::<Op>());
}
