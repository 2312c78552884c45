use crate::decoder::{decode_with, Decoded, DecodeError, Decoder, Width};
use crate::instructions::Catalog;

/// Classic AVR instruction set in descriptor form.
///
/// Ordering matters: exact encodings (SREG aliases, `ser`, pointer forms of
/// `ld`/`st`) sit before the general encodings that would also match them.
pub const DESCRIPTORS: &str = "\
# control
0000000000000000 16 0 nop
1001010100001000 16 0 ret
1001010100011000 16 0 reti
1001010100001001 16 0 icall
1001010100011001 16 0 eicall
1001010000001001 16 0 ijmp
1001010000011001 16 0 eijmp
1001010110001000 16 0 sleep
1001010110011000 16 0 break
1001010110101000 16 0 wdr
1001010111001000 16 0 lpm
1001010111011000 16 0 elpm
1001010111101000 16 0 spm
# status register
1001010000001000 16 0 sec
1001010000011000 16 0 sez
1001010000101000 16 0 sen
1001010000111000 16 0 sev
1001010001001000 16 0 ses
1001010001011000 16 0 seh
1001010001101000 16 0 set
1001010001111000 16 0 sei
1001010010001000 16 0 clc
1001010010011000 16 0 clz
1001010010101000 16 0 cln
1001010010111000 16 0 clv
1001010011001000 16 0 cls
1001010011011000 16 0 clh
1001010011101000 16 0 clt
1001010011111000 16 0 cli
# multiply and register pairs
00000001ddddrrrr 16 2 movw Rd,Rr pp
00000010ddddrrrr 16 2 muls Rd,Rr hh
000000110ddd0rrr 16 2 mulsu Rd,Rr uu
000000110ddd1rrr 16 2 fmul Rd,Rr uu
000000111ddd0rrr 16 2 fmuls Rd,Rr uu
000000111ddd1rrr 16 2 fmulsu Rd,Rr uu
100111rdddddrrrr 16 2 mul Rd,Rr rr
# two register arithmetic and logic
000001rdddddrrrr 16 2 cpc Rd,Rr rr
000010rdddddrrrr 16 2 sbc Rd,Rr rr
000011rdddddrrrr 16 2 add Rd,Rr rr
000100rdddddrrrr 16 2 cpse Rd,Rr rr
000101rdddddrrrr 16 2 cp Rd,Rr rr
000110rdddddrrrr 16 2 sub Rd,Rr rr
000111rdddddrrrr 16 2 adc Rd,Rr rr
001000rdddddrrrr 16 2 and Rd,Rr rr
001001rdddddrrrr 16 2 eor Rd,Rr rr
001010rdddddrrrr 16 2 or Rd,Rr rr
001011rdddddrrrr 16 2 mov Rd,Rr rr
# register and immediate
0011KKKKddddKKKK 16 2 cpi Rd,K hb
0100KKKKddddKKKK 16 2 sbci Rd,K hb
0101KKKKddddKKKK 16 2 subi Rd,K hb
0110KKKKddddKKKK 16 2 ori Rd,K hb
0111KKKKddddKKKK 16 2 andi Rd,K hb
11101111dddd1111 16 1 ser Rd h
1110KKKKddddKKKK 16 2 ldi Rd,K hb
10010110KKddKKKK 16 2 adiw Rd,K wn
10010111KKddKKKK 16 2 sbiw Rd,K wn
10010100KKKK1011 16 1 des K n
# single register
1001010ddddd0010 16 1 swap Rd r
1001010ddddd0011 16 1 inc Rd r
1001010ddddd0101 16 1 asr Rd r
1001010ddddd0110 16 1 lsr Rd r
1001010ddddd0111 16 1 ror Rd r
1001010ddddd1010 16 1 dec Rd r
1001010ddddd0000 16 1 com Rd r
1001010ddddd0001 16 1 neg Rd r
# loads
1001000ddddd0000 32 2 lds Rd,k rk
1001000ddddd0001 16 2 ld Rd,Z+ rx
1001000ddddd0010 16 2 ld Rd,-Z rx
1001000ddddd0100 16 2 lpm Rd,Z rx
1001000ddddd0101 16 2 lpm Rd,Z+ rx
1001000ddddd0110 16 2 elpm Rd,Z rx
1001000ddddd0111 16 2 elpm Rd,Z+ rx
1001000ddddd1001 16 2 ld Rd,Y+ rx
1001000ddddd1010 16 2 ld Rd,-Y rx
1001000ddddd1100 16 2 ld Rd,X rx
1001000ddddd1101 16 2 ld Rd,X+ rx
1001000ddddd1110 16 2 ld Rd,-X rx
1001000ddddd1111 16 1 pop Rd r
1000000ddddd1000 16 2 ld Rd,Y rx
1000000ddddd0000 16 2 ld Rd,Z rx
10q0qq0ddddd1qqq 16 2 ldd Rd,Y+q rq
10q0qq0ddddd0qqq 16 2 ldd Rd,Z+q rq
# stores
1001001rrrrr0000 32 2 sts k,Rr kr
1001001rrrrr0001 16 2 st Z+,Rr xr
1001001rrrrr0010 16 2 st -Z,Rr xr
1001001rrrrr1001 16 2 st Y+,Rr xr
1001001rrrrr1010 16 2 st -Y,Rr xr
1001001rrrrr1100 16 2 st X,Rr xr
1001001rrrrr1101 16 2 st X+,Rr xr
1001001rrrrr1110 16 2 st -X,Rr xr
1001001rrrrr1111 16 1 push Rr r
1000001rrrrr1000 16 2 st Y,Rr xr
1000001rrrrr0000 16 2 st Z,Rr xr
10q0qq1rrrrr1qqq 16 2 std Y+q,Rr qr
10q0qq1rrrrr0qqq 16 2 std Z+q,Rr qr
# jumps and calls
1001010kkkkk110k 32 1 jmp k a
1001010kkkkk111k 32 1 call k a
1100kkkkkkkkkkkk 16 1 rjmp k j
1101kkkkkkkkkkkk 16 1 rcall k j
# i/o
10011000AAAAAbbb 16 2 cbi A,b oi
10011001AAAAAbbb 16 2 sbic A,b oi
10011010AAAAAbbb 16 2 sbi A,b oi
10011011AAAAAbbb 16 2 sbis A,b oi
10110AAdddddAAAA 16 2 in Rd,A ro
10111AArrrrrAAAA 16 2 out A,Rr or
# conditional branches
111100kkkkkkk000 16 1 brcs k s
111100kkkkkkk001 16 1 breq k s
111100kkkkkkk010 16 1 brmi k s
111100kkkkkkk011 16 1 brvs k s
111100kkkkkkk100 16 1 brlt k s
111100kkkkkkk101 16 1 brhs k s
111100kkkkkkk110 16 1 brts k s
111100kkkkkkk111 16 1 brie k s
111101kkkkkkk000 16 1 brcc k s
111101kkkkkkk001 16 1 brne k s
111101kkkkkkk010 16 1 brpl k s
111101kkkkkkk011 16 1 brvc k s
111101kkkkkkk100 16 1 brge k s
111101kkkkkkk101 16 1 brhc k s
111101kkkkkkk110 16 1 brtc k s
111101kkkkkkk111 16 1 brid k s
# bit transfer and skips
1111100ddddd0bbb 16 2 bld Rd,b ri
1111101ddddd0bbb 16 2 bst Rd,b ri
1111110rrrrr0bbb 16 2 sbrc Rr,b ri
1111111rrrrr0bbb 16 2 sbrs Rr,b ri
";

/// Table-driven AVR decoder over a borrowed catalog.
pub struct AvrDecoder<'c> {
    catalog: &'c Catalog,
}

impl<'c> AvrDecoder<'c> {
    pub fn new(catalog: &'c Catalog) -> Self {
        Self { catalog }
    }
}

impl Decoder for AvrDecoder<'_> {
    fn decode(&self, first: u16, second: Option<u16>) -> Result<Decoded, DecodeError> {
        let desc = self.catalog.lookup(first).ok_or(DecodeError::NoMatch { word: first })?;
        let opcode = match (desc.width, second) {
            (Width::W16, _) => first as u32,
            (Width::W32, Some(second)) => (first as u32) << 16 | second as u32,
            (Width::W32, None) => {
                return Err(DecodeError::Incomplete {
                    mnemonic: desc.mnemonic.clone(),
                    needed: Width::W32.bytes(),
                })
            }
        };
        let d = decode_with(desc, opcode);
        tracing::trace!(word = first, mnemonic = %d.mnemonic, "decoded");
        Ok(d)
    }
}
